//! Input loading: the id backlog and the proxy and login lists
//!
//! Everything here runs once at startup, before any worker is spawned.

mod ids;
mod lists;

pub use ids::{apply_known_ids, load_ids, prepare_backlog, read_id_file, remove_finished};
pub use lists::{
    load_credentials, load_proxies, read_login_file, read_proxy_file, ProxySource,
};
