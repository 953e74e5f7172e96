use serde::{Deserialize, Serialize};

use crate::error::{FitError, FitResult};

/// Who is calling. Issued by the auth provider and handed to every
/// operation; nothing in the crate keeps a current user around.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  auth_id: Option<String>,
  access_token: Option<String>,
}

impl Session {
  pub fn anonymous() -> Self {
    Self::default()
  }

  pub fn authenticated(auth_id: impl Into<String>) -> Self {
    Self {
      auth_id: Some(auth_id.into()),
      access_token: None,
    }
  }

  pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
    self.access_token = Some(token.into());
    self
  }

  /// Auth identity of the signed-in user, if any
  pub fn current_user_id(&self) -> Option<&str> {
    self.auth_id.as_deref()
  }

  pub fn access_token(&self) -> Option<&str> {
    self.access_token.as_deref()
  }

  pub fn is_authenticated(&self) -> bool {
    self.auth_id.is_some()
  }

  pub fn require_user_id(&self) -> FitResult<&str> {
    self.current_user_id().ok_or(FitError::NotAuthenticated)
  }
}
