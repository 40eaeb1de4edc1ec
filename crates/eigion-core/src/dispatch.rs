//! Transaction boundary around command execution.
//!
//! One command, one transaction. The transaction commits only when the
//! response payload is not an error; every failure path drops it, which
//! rolls back, so a failed command leaves no partial writes behind.

use eigion_proto::messages::{Command, Response};
use tracing::warn;
use uuid::Uuid;

use crate::executor::{self, ExecContext};
use crate::policy::SecurityPolicy;
use crate::session::Session;
use crate::store::{Role, StoreConnection, StoreError};

/// Execute one command inside its own transaction.
///
/// Returns `Err` only when the transaction itself cannot be opened or
/// committed; handler failures are returned as error responses.
#[allow(clippy::too_many_arguments)]
pub fn dispatch_command(
    connection: &mut dyn StoreConnection,
    session: &Session,
    policy: &dyn SecurityPolicy,
    role: Role,
    request_id: Uuid,
    now: u64,
    command: &Command,
) -> Result<Response, StoreError> {
    let mut transaction = connection.open_transaction()?;
    let response = {
        let mut ctx = ExecContext {
            transaction: &mut *transaction,
            session,
            policy,
            role,
            request_id,
            now,
        };
        executor::execute(&mut ctx, command)
    };
    if response.payload.is_error() {
        // Dropping the transaction rolls it back.
        warn!(command = command.name(), "rolling back failed command");
        drop(transaction);
    } else {
        transaction.commit()?;
    }
    Ok(response)
}
