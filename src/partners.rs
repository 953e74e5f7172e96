//! Partner search, invites and partner statistics

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{FitError, FitResult};
use crate::models::{
  InviteResponse, NewPartnerLink, PartnerInvite, PartnerInvites, PartnerLink, PartnerStatus,
  UserSummary,
};
use crate::profiles::{get_profile, require_profile};
use crate::session::Session;
use crate::stats::{WeekWindow, WeeklyStats};
use crate::store::{
  fields, insert_one, select_as, select_first, tables, to_row, Embed, Filter, Query, SessionStore,
  Store,
};
use crate::workouts::fetch_week;

pub const SEARCH_LIMIT: usize = 10;

/// What the partner card shows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerStats {
  pub name: String,
  pub username: String,
  pub is_favorite: bool,
  #[serde(flatten)]
  pub stats: WeeklyStats,
}

/// Keep characters that are safe inside a filter value
fn sanitize_query(query: &str) -> String {
  query
    .chars()
    .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '@'))
    .collect::<String>()
    .trim()
    .to_string()
}

/// Ids of everyone the user already has a link with, in either direction
async fn linked_user_ids(store: &dyn Store, user_id: &str) -> FitResult<Vec<Value>> {
  let links: Vec<PartnerLink> = select_as(
    store,
    &Query::from(tables::WORKOUT_PARTNERS)
      .select(fields(&["user_id", "partner_id"]))
      .filter(Filter::or(vec![
        Filter::eq("user_id", user_id),
        Filter::eq("partner_id", user_id),
      ])),
  )
  .await?;

  Ok(
    links
      .into_iter()
      .map(|l| if l.user_id == user_id { l.partner_id } else { l.user_id })
      .map(Value::String)
      .collect(),
  )
}

/// Users whose username or name contains `query`, excluding the caller and
/// anyone already linked
pub async fn search_users(
  store: &dyn Store,
  session: &Session,
  query: &str,
) -> FitResult<Vec<UserSummary>> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  let me = require_profile(store, session).await?;
  let term = sanitize_query(query);
  if term.is_empty() {
    return Ok(Vec::new());
  }

  let pattern = format!("%{}%", term);
  let users = select_as(
    store,
    &Query::from(tables::USERS)
      .select(fields(&["id", "name", "username"]))
      .filter(Filter::or(vec![
        Filter::ilike("username", &pattern),
        Filter::ilike("name", &pattern),
      ]))
      .filter(Filter::neq("id", me.id.as_str()))
      .filter(Filter::not_in("id", linked_user_ids(store, &me.id).await?))
      .order("username", true)
      .limit(SEARCH_LIMIT),
  )
  .await?;

  debug!("Search '{}' matched {} users", term, users.len());
  Ok(users)
}

pub async fn send_invite(
  store: &dyn Store,
  session: &Session,
  partner_id: &str,
) -> FitResult<PartnerLink> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  let me = require_profile(store, session).await?;
  if me.id == partner_id {
    return Err(FitError::InvalidInput("Cannot invite yourself".into()));
  }

  let link: PartnerLink = insert_one(
    store,
    tables::WORKOUT_PARTNERS,
    &NewPartnerLink {
      user_id: me.id.clone(),
      partner_id: partner_id.to_string(),
      status: PartnerStatus::Pending,
    },
  )
  .await?;

  info!("Partner invite {} sent from {} to {}", link.id, me.id, partner_id);
  Ok(link)
}

fn invite_query(own_column: &str, counterpart_column: &str, user_id: &str) -> Query {
  let mut columns = fields(&["id", "status", "created_at", "is_favorite"]);
  columns.push(
    Embed::new(tables::USERS)
      .alias("counterpart")
      .via(counterpart_column)
      .columns(fields(&["id", "name", "username"]))
      .into(),
  );

  Query::from(tables::WORKOUT_PARTNERS)
    .select(columns)
    .filter(Filter::eq(own_column, user_id))
    .order("created_at", false)
}

/// Invites the caller sent and received, each with the other side's summary
pub async fn get_partners(store: &dyn Store, session: &Session) -> FitResult<PartnerInvites> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  let me = require_profile(store, session).await?;

  let sent: Vec<PartnerInvite> =
    select_as(store, &invite_query("user_id", "partner_id", &me.id)).await?;
  let received: Vec<PartnerInvite> =
    select_as(store, &invite_query("partner_id", "user_id", &me.id)).await?;

  Ok(PartnerInvites { sent, received })
}

async fn find_link(store: &dyn Store, filters: Vec<Filter>) -> FitResult<PartnerLink> {
  let query = filters
    .into_iter()
    .fold(Query::from(tables::WORKOUT_PARTNERS), Query::filter);
  select_first(store, query)
    .await?
    .ok_or_else(|| FitError::NotFound("Partner invite".into()))
}

/// Accept or reject an invite addressed to the caller
pub async fn respond_to_invite(
  store: &dyn Store,
  session: &Session,
  invite_id: &str,
  response: InviteResponse,
) -> FitResult<()> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  let me = require_profile(store, session).await?;
  let filters = vec![
    Filter::eq("id", invite_id),
    Filter::eq("partner_id", me.id.as_str()),
  ];
  find_link(store, filters.clone()).await?;

  let status = PartnerStatus::from(response);
  store
    .update(
      tables::WORKOUT_PARTNERS,
      to_row(&json!({ "status": status }))?,
      &filters,
    )
    .await?;
  info!("Invite {} {}", invite_id, status);
  Ok(())
}

/// Remove a link from either side
pub async fn cancel_invite(store: &dyn Store, session: &Session, invite_id: &str) -> FitResult<()> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  let me = require_profile(store, session).await?;
  let filters = vec![
    Filter::eq("id", invite_id),
    Filter::or(vec![
      Filter::eq("user_id", me.id.as_str()),
      Filter::eq("partner_id", me.id.as_str()),
    ]),
  ];
  find_link(store, filters.clone()).await?;

  store.delete(tables::WORKOUT_PARTNERS, &filters).await?;
  info!("Invite {} cancelled by {}", invite_id, me.id);
  Ok(())
}

fn accepted_link_filters(user_id: &str, partner_id: &str) -> Vec<Filter> {
  vec![
    Filter::eq("user_id", user_id),
    Filter::eq("partner_id", partner_id),
    Filter::eq("status", PartnerStatus::Accepted.to_string()),
  ]
}

pub async fn toggle_favorite_partner(
  store: &dyn Store,
  session: &Session,
  partner_id: &str,
  is_favorite: bool,
) -> FitResult<()> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  let me = require_profile(store, session).await?;
  let filters = accepted_link_filters(&me.id, partner_id);
  find_link(store, filters.clone()).await?;

  store
    .update(
      tables::WORKOUT_PARTNERS,
      to_row(&json!({ "is_favorite": is_favorite }))?,
      &filters,
    )
    .await
}

/// A partner's weekly numbers plus whether the caller favorited them
pub async fn partner_stats(
  store: &dyn Store,
  session: &Session,
  partner_id: &str,
  window: WeekWindow,
) -> FitResult<PartnerStats> {
  let scoped = SessionStore::new(store, session);
  let store = scoped.get();
  let me = require_profile(store, session).await?;
  let partner = get_profile(store, partner_id)
    .await?
    .ok_or_else(|| FitError::NotFound("Partner".into()))?;

  let link_query = accepted_link_filters(&me.id, partner_id).into_iter().fold(
    Query::from(tables::WORKOUT_PARTNERS).select(fields(&["is_favorite"])),
    Query::filter,
  );
  let link: Option<PartnerLink> = select_first(store, link_query).await?;

  let workouts = fetch_week(store, partner_id, window).await?;

  Ok(PartnerStats {
    name: partner.name,
    username: partner.username,
    is_favorite: link.map(|l| l.is_favorite).unwrap_or(false),
    stats: WeeklyStats::compute(&workouts),
  })
}
