use tokio::sync::{Mutex, RwLock};

use crate::{archive::Archiver, service::ReviewService};

pub(crate) struct AppState {
    /// Many poll readers, one writer per applied update.
    pub(crate) service: RwLock<ReviewService>,
    pub(crate) archiver: Mutex<Archiver>,
}
