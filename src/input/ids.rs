//! Backlog construction from id ranges and id files

use crate::config::{IdSource, RunOptions};
use crate::{InputError, InputResult};
use rand::seq::SliceRandom;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Reads a file of ids, one per line; blank lines are skipped
pub fn read_id_file(path: &Path) -> InputResult<BTreeSet<u64>> {
    let content = fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut ids = BTreeSet::new();
    for (index, line) in content.lines().enumerate() {
        let value = line.trim();
        if value.is_empty() {
            continue;
        }

        let id = value.parse::<u64>().map_err(|_| InputError::InvalidId {
            path: path.to_path_buf(),
            line: index + 1,
            value: value.to_string(),
        })?;
        ids.insert(id);
    }

    Ok(ids)
}

/// Resolves an id source into a de-duplicated, ordered set
pub fn load_ids(source: &IdSource) -> InputResult<BTreeSet<u64>> {
    match source {
        IdSource::Range { start, end } => Ok((*start..*end).collect()),
        IdSource::File(path) => {
            tracing::debug!("Loading ids from {}", path.display());
            read_id_file(path)
        }
    }
}

/// Drops ids known not to exist
///
/// `known` lists the ids that exist up to its largest entry. Any id from 1
/// up to that maximum that is not listed is skipped; id 0 and ids at or above
/// the maximum are kept.
pub fn apply_known_ids(ids: &mut BTreeSet<u64>, known: &BTreeSet<u64>) {
    let Some(&max_known) = known.iter().next_back() else {
        return;
    };

    ids.retain(|id| *id == 0 || *id >= max_known || known.contains(id));
}

/// Drops ids already present in the finished log
pub fn remove_finished(ids: &mut BTreeSet<u64>, finished: &BTreeSet<u64>) {
    ids.retain(|id| !finished.contains(id));
}

/// Builds the initial backlog for a run
///
/// Filters the configured ids through the ignore file and, when resuming, the
/// finished log. Missing ignore or finished files filter nothing.
pub fn prepare_backlog(options: &RunOptions) -> InputResult<Vec<u64>> {
    tracing::info!("Preparing id list");

    let mut ids = load_ids(&options.ids)?;

    if let Some(ignore) = options.ignore_ids.as_deref().filter(|p| p.is_file()) {
        tracing::debug!("Ignoring unknown ids using {}", ignore.display());
        let known = read_id_file(ignore)?;
        apply_known_ids(&mut ids, &known);
    }

    if options.resume && options.output.finished_path.is_file() {
        tracing::debug!("Skipping ids from finished file (resume)");
        let finished = read_id_file(&options.output.finished_path)?;
        let input = ids.len();
        remove_finished(&mut ids, &finished);

        tracing::info!("input:    {}", input);
        tracing::info!("finished: {}", finished.len());
        tracing::info!("left:     {}", ids.len());
    }

    let mut backlog: Vec<u64> = ids.into_iter().collect();
    if options.shuffle {
        tracing::debug!("Shuffling ids");
        backlog.shuffle(&mut rand::thread_rng());
    }

    Ok(backlog)
}
