//! Per-request permission checks and owner resolution shared by the
//! handlers.

use fieldwork_core::{
  Error as CoreError,
  owner::Owner,
  permission::{Need, authorize},
  reference::{ReferenceResolver, ResolveError},
  store::Store,
  validation::{FieldErrors, OBJECT_DOES_NOT_EXIST},
};
use tracing::debug;

use crate::{AppState, auth::Caller, error::ApiError};

/// Check that `caller` may do `need` in `project_id`.
///
/// No grant yields [`ApiError::NotFound`] so the caller cannot probe for
/// records in projects they have no part in.
pub async fn require<S: Store>(
  state: &AppState<S>,
  caller: &Caller,
  project_id: i64,
  need: Need,
) -> Result<(), ApiError> {
  let role = state
    .store
    .role_for(project_id, caller.username.clone())
    .await
    .map_err(ApiError::store)?;
  authorize(role, need).map_err(|denial| {
    debug!(project_id, username = %caller.username, ?need, ?denial, "access denied");
    ApiError::from(denial)
  })
}

/// Resolve a reference-valued input `field` to an owner the caller can see.
///
/// Problems with the reference itself are recorded in `errors` and yield
/// `Ok(None)`; only store failures are returned as `Err`. An owner in a
/// project the caller has no role on is reported as nonexistent.
pub async fn resolve_owner<S: Store>(
  state: &AppState<S>,
  resolver: &ReferenceResolver,
  caller: &Caller,
  field: &str,
  reference: &str,
  errors: &mut FieldErrors,
) -> Result<Option<Owner>, ApiError> {
  let owner = match resolver.resolve(reference, state.store.as_ref()).await {
    Ok(owner) => owner,
    Err(ResolveError::Reference(CoreError::ReferenceNotFound(_))) => {
      errors.add(field, OBJECT_DOES_NOT_EXIST);
      return Ok(None);
    }
    Err(ResolveError::Reference(e)) => {
      errors.add(field, e.to_string());
      return Ok(None);
    }
    Err(ResolveError::Store(e)) => return Err(ApiError::store(e)),
  };

  match require(state, caller, owner.project_id, Need::View).await {
    Ok(()) => Ok(Some(owner)),
    Err(ApiError::NotFound) => {
      errors.add(field, OBJECT_DOES_NOT_EXIST);
      Ok(None)
    }
    Err(e) => Err(e),
  }
}
