//! Application profiles linked to auth identities

use log::{info, warn};
use serde_json::json;

use crate::error::{FitError, FitResult};
use crate::models::{NewProfile, ProfileUpdate, UserProfile};
use crate::session::Session;
use crate::store::{from_rows, select_first, tables, to_row, Filter, Query, SessionStore, Store};

async fn find_by_auth_id(store: &dyn Store, auth_id: &str) -> FitResult<Option<UserProfile>> {
  select_first(
    store,
    Query::from(tables::USERS).filter(Filter::eq("auth_id", auth_id)),
  )
  .await
}

/// Profile row by its own id
pub async fn get_profile(store: &dyn Store, user_id: &str) -> FitResult<Option<UserProfile>> {
  select_first(store, Query::from(tables::USERS).filter(Filter::eq("id", user_id))).await
}

/// The caller's profile, or `None` when signed out or not yet created
pub async fn current_profile(store: &dyn Store, session: &Session) -> FitResult<Option<UserProfile>> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  match session.current_user_id() {
    Some(auth_id) => find_by_auth_id(store, auth_id).await,
    None => Ok(None),
  }
}

pub async fn require_profile(store: &dyn Store, session: &Session) -> FitResult<UserProfile> {
  let auth_id = session.require_user_id()?;
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  find_by_auth_id(store, auth_id)
    .await?
    .ok_or_else(|| FitError::NotFound("User profile".into()))
}

/// Create the caller's profile after sign-up.
///
/// Sign-up can race with a retry, so a failed insert falls back to the
/// profile already stored for the same auth id.
pub async fn create_profile(
  store: &dyn Store,
  session: &Session,
  profile: NewProfile,
) -> FitResult<UserProfile> {
  let auth_id = session.require_user_id()?;
  profile.validate()?;
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();

  let mut row = to_row(&profile)?;
  row.insert("auth_id".to_string(), json!(auth_id));

  match store.insert(tables::USERS, vec![row]).await {
    Ok(rows) => {
      let created = from_rows::<UserProfile>(rows)?
        .into_iter()
        .next()
        .ok_or_else(|| FitError::Persistence("Profile insert returned no rows".into()))?;
      info!("Created profile {} for {}", created.id, auth_id);
      Ok(created)
    }
    Err(err) => match find_by_auth_id(store, auth_id).await? {
      Some(existing) => {
        warn!("Profile insert failed ({}), using existing profile {}", err, existing.id);
        Ok(existing)
      }
      None => Err(err),
    },
  }
}

/// Validate and apply a profile patch, returning the stored result
pub async fn update_profile(
  store: &dyn Store,
  session: &Session,
  update: ProfileUpdate,
) -> FitResult<UserProfile> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  let profile = require_profile(store, session).await?;
  update.validate()?;

  if !update.is_empty() {
    store
      .update(
        tables::USERS,
        to_row(&update)?,
        &[Filter::eq("id", profile.id.as_str())],
      )
      .await?;
    info!("Updated profile {}", profile.id);
  }

  get_profile(store, &profile.id)
    .await?
    .ok_or_else(|| FitError::NotFound("User profile".into()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::RestStore;
  use crate::test_utils::{seed_test_user, session_for, setup_test_store, teardown_test_store};
  use mockito::Matcher;

  fn new_profile(username: &str) -> NewProfile {
    NewProfile {
      email: format!("{}@example.com", username),
      name: "Sam Lifter".into(),
      username: username.into(),
      height: Some(70.0),
      weight: Some(180.0),
    }
  }

  #[tokio::test]
  async fn test_current_profile_without_session() {
    let store = setup_test_store().await;
    assert!(current_profile(&store, &Session::anonymous()).await.unwrap().is_none());
    assert!(matches!(
      require_profile(&store, &Session::anonymous()).await,
      Err(FitError::NotAuthenticated)
    ));
    teardown_test_store(store).await;
  }

  #[tokio::test]
  async fn test_require_profile_missing_row() {
    let store = setup_test_store().await;
    let err = require_profile(&store, &Session::authenticated("ghost")).await.unwrap_err();
    assert_eq!(err.to_string(), "User profile not found");
    teardown_test_store(store).await;
  }

  #[tokio::test]
  async fn test_create_profile_and_lookup() {
    let store = setup_test_store().await;
    let session = Session::authenticated("auth-new");

    let created = create_profile(&store, &session, new_profile("sam_l")).await.unwrap();
    assert_eq!(created.auth_id, "auth-new");
    assert_eq!(created.username, "sam_l");
    assert_eq!(created.height, Some(70.0));

    let current = current_profile(&store, &session).await.unwrap().unwrap();
    assert_eq!(current, created);
    teardown_test_store(store).await;
  }

  #[tokio::test]
  async fn test_create_profile_twice_returns_existing() {
    let store = setup_test_store().await;
    let session = Session::authenticated("auth-new");

    let first = create_profile(&store, &session, new_profile("sam_l")).await.unwrap();
    // auth_id is unique, so the second insert fails
    let second = create_profile(&store, &session, new_profile("other")).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.username, "sam_l");
    teardown_test_store(store).await;
  }

  #[tokio::test]
  async fn test_create_profile_validates() {
    let store = setup_test_store().await;
    let session = Session::authenticated("auth-new");
    let result = create_profile(&store, &session, new_profile("bad name!")).await;
    assert!(matches!(result, Err(FitError::InvalidInput(_))));
    teardown_test_store(store).await;
  }

  #[tokio::test]
  async fn test_update_profile_applies_patch() {
    let store = setup_test_store().await;
    let user = seed_test_user(&store, "auth-1", "lifter").await;
    let session = session_for(&user);

    let updated = update_profile(
      &store,
      &session,
      ProfileUpdate {
        name: Some("New Name".into()),
        weight: Some(200.0),
        ..Default::default()
      },
    )
    .await
    .unwrap();
    assert_eq!(updated.name, "New Name");
    assert_eq!(updated.weight, Some(200.0));
    assert_eq!(updated.username, "lifter");

    let rejected = update_profile(
      &store,
      &session,
      ProfileUpdate {
        height: Some(120.0),
        ..Default::default()
      },
    )
    .await;
    assert!(matches!(rejected, Err(FitError::InvalidInput(_))));
    teardown_test_store(store).await;
  }

  #[tokio::test]
  async fn test_rest_requests_carry_the_session_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/rest/v1/users")
      .match_header("authorization", "Bearer user-jwt")
      .match_header("apikey", "anon-key")
      .match_query(Matcher::UrlEncoded("auth_id".into(), "eq.auth-1".into()))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(
        r#"[{"id": "u1", "auth_id": "auth-1", "email": "sam@example.com", "name": "Sam", "username": "sam_l"}]"#,
      )
      .create_async()
      .await;

    let store = RestStore::new(&server.url(), "anon-key").unwrap();
    let session = Session::authenticated("auth-1").with_access_token("user-jwt");
    let profile = require_profile(&store, &session).await.unwrap();
    assert_eq!(profile.id, "u1");
    assert_eq!(profile.username, "sam_l");
    mock.assert_async().await;
  }
}
