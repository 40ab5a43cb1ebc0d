pub mod accounts;
pub mod auth;
pub mod health;
pub mod meetings;
pub mod signup;

use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::models::account::Account;

/// Load the acting account for an authenticated request. A token whose
/// account has been deleted or deactivated no longer authenticates.
pub(crate) async fn current_account(state: &AppState, account_id: Uuid) -> AppResult<Account> {
    let db_account = state
        .directory
        .find_by_id(account_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;

    if !db_account.active {
        return Err(AppError::unauthorized("account is deactivated"));
    }

    db_account.try_into()
}
