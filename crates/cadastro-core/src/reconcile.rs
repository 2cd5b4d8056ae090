//! Keyed diff between a submitted child collection and what is stored.
//!
//! [`plan`] is pure: it pairs each desired record with at most one current
//! child, first by id and then by natural key, and emits the minimal list of
//! [`Op`]s. [`apply`] runs those ops strictly in order against a
//! [`ChildStore`], stopping at the first error. Nothing is rolled back here;
//! callers that need atomicity wrap the call in a transaction.

use serde::Serialize;

use crate::store::{Child, ChildStore};

// ─── Types ───────────────────────────────────────────────────────────────────

/// A child row as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stored<C> {
  pub id:    i64,
  #[serde(skip)]
  pub owner: i64,
  #[serde(flatten)]
  pub value: C,
}

/// A child row as submitted. `id` is present when the client is editing a
/// row it previously read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Desired<C> {
  pub id:    Option<i64>,
  pub value: C,
}

impl<C> Desired<C> {
  pub fn new(value: C) -> Self { Self { id: None, value } }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op<C> {
  Insert(C),
  Update { id: i64, value: C },
  Delete(i64),
}

/// Counts of what [`apply`] actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
  pub inserted: usize,
  pub updated:  usize,
  pub deleted:  usize,
}

/// Key function for children that only match by id.
pub fn by_id<C>(_: &C) -> Option<()> { None }

/// Key function for children without a natural key: a record submitted
/// without an id reuses an unmatched stored row holding the same value.
pub fn by_value<C: Clone>(value: &C) -> Option<C> { Some(value.clone()) }

// ─── Plan ────────────────────────────────────────────────────────────────────

/// Compute the ops that turn `current` into `desired`.
///
/// Inserts and updates come in `desired` order, then deletes in `current`
/// order. A desired id that is not among `current` is treated as new. An
/// update whose value equals the stored one is skipped.
pub fn plan<C, K, F>(
  desired: Vec<Desired<C>>,
  current: &[Stored<C>],
  key: F,
) -> Vec<Op<C>>
where
  C: PartialEq,
  K: PartialEq,
  F: Fn(&C) -> Option<K>,
{
  let mut matched = vec![false; current.len()];
  let mut ops = Vec::new();

  for wanted in desired {
    match find_match(&wanted, current, &matched, &key) {
      Some(i) => {
        matched[i] = true;
        if current[i].value != wanted.value {
          ops.push(Op::Update { id: current[i].id, value: wanted.value });
        }
      }
      None => ops.push(Op::Insert(wanted.value)),
    }
  }

  ops.extend(
    current
      .iter()
      .zip(&matched)
      .filter(|(_, m)| !**m)
      .map(|(c, _)| Op::Delete(c.id)),
  );

  ops
}

fn find_match<C, K, F>(
  wanted: &Desired<C>,
  current: &[Stored<C>],
  matched: &[bool],
  key: &F,
) -> Option<usize>
where
  K: PartialEq,
  F: Fn(&C) -> Option<K>,
{
  let unmatched = || {
    current
      .iter()
      .enumerate()
      .filter(|(i, _)| !matched[*i])
  };

  let by_id = wanted
    .id
    .and_then(|id| unmatched().find(|(_, c)| c.id == id));
  if let Some((i, _)) = by_id {
    return Some(i);
  }

  let wanted_key = key(&wanted.value)?;
  unmatched()
    .find(|(_, c)| key(&c.value).as_ref() == Some(&wanted_key))
    .map(|(i, _)| i)
}

// ─── Apply ───────────────────────────────────────────────────────────────────

/// Execute `ops` under `owner`, one at a time.
pub async fn apply<S, C>(
  store: &S,
  owner: i64,
  ops: Vec<Op<C>>,
) -> Result<Applied, S::Error>
where
  S: ChildStore<C>,
  C: Child,
{
  let mut applied = Applied::default();
  for op in ops {
    match op {
      Op::Insert(value) => {
        store.insert_child(owner, value).await?;
        applied.inserted += 1;
      }
      Op::Update { id, value } => {
        if store.update_child(owner, id, value).await? {
          applied.updated += 1;
        }
      }
      Op::Delete(id) => {
        if store.delete_child(owner, id).await? {
          applied.deleted += 1;
        }
      }
    }
  }
  Ok(applied)
}

/// Load the current children of `owner`, plan against `desired` and apply.
pub async fn reconcile<S, C, K, F>(
  store: &S,
  owner: i64,
  desired: Vec<Desired<C>>,
  key: F,
) -> Result<Applied, S::Error>
where
  S: ChildStore<C>,
  C: Child,
  K: PartialEq,
  F: Fn(&C) -> Option<K> + Send,
{
  let current = store.list_children(owner).await?;
  let ops = plan(desired, &current, key);
  apply(store, owner, ops).await
}
