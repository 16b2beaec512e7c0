use std::sync::Arc;

use crate::ledger::MatchLedger;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<MatchLedger>,
}
