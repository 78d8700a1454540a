//! Batch-open planning for reader groups
//!
//! Opening several comics at once is planned in two pure steps: which
//! sessions to reuse, create and close, and which session ends up focused.

use std::collections::HashSet;
use std::str::FromStr;

/// How a batch request combines with the sessions already open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Keep existing sessions and add missing ones
    #[default]
    Merge,

    /// Close every session that is not requested
    Replace,
}

impl FromStr for BatchMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "merge" => Ok(BatchMode::Merge),
            "replace" => Ok(BatchMode::Replace),
            other => Err(format!("unknown batch mode: {other}")),
        }
    }
}

/// Which session receives focus after a batch open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusPolicy {
    /// The session named by the caller
    #[default]
    Explicit,
    FirstNew,
    LastNew,

    /// Whatever was active before the batch
    PreserveActive,
}

impl FromStr for FocusPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "explicit" => Ok(FocusPolicy::Explicit),
            "first-new" => Ok(FocusPolicy::FirstNew),
            "last-new" => Ok(FocusPolicy::LastNew),
            "preserve-active" => Ok(FocusPolicy::PreserveActive),
            other => Err(format!("unknown focus policy: {other}")),
        }
    }
}

/// Trim, drop empty entries and de-duplicate keeping first occurrences
pub fn normalize_comic_dirs<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut normalized = Vec::new();
    for value in values {
        let dir = value.as_ref().trim();
        if dir.is_empty() || !seen.insert(dir.to_string()) {
            continue;
        }
        normalized.push(dir.to_string());
    }
    normalized
}

/// Sessions to reuse, open and close for one batch request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchMutationPlan {
    /// Normalized request order
    pub request: Vec<String>,
    pub reused: Vec<String>,
    pub new: Vec<String>,

    /// Sessions to close, last opened first
    pub close: Vec<String>,
}

/// Plan how `request` is applied on top of `current`
pub fn compute_batch_mutation_plan<S: AsRef<str>>(current: &[S], request: &[S], mode: BatchMode) -> BatchMutationPlan {
    let current = normalize_comic_dirs(current);
    let request = normalize_comic_dirs(request);
    let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();

    let (reused, new): (Vec<String>, Vec<String>) =
        request.iter().cloned().partition(|dir| current_set.contains(dir.as_str()));

    let close = match mode {
        BatchMode::Merge => Vec::new(),
        BatchMode::Replace => {
            let request_set: HashSet<&str> = request.iter().map(String::as_str).collect();
            current.iter().rev().filter(|dir| !request_set.contains(dir.as_str())).cloned().collect()
        }
    };

    BatchMutationPlan { request, reused, new, close }
}

/// Inputs for [`resolve_activation_session_id`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivationInputs<'a> {
    pub focus_policy: FocusPolicy,
    pub focus_session_id: Option<&'a str>,
    pub previous_active: Option<&'a str>,
    pub current_active: Option<&'a str>,
    pub first_new: Option<&'a str>,
    pub last_new: Option<&'a str>,
    pub request_ordered: &'a [&'a str],

    /// Open sessions in open order
    pub open: &'a [&'a str],
}

/// Pick the session to focus after a batch open
///
/// The policy's choice wins when it is open; otherwise the last requested
/// open session, then the current active one, then the first open one.
pub fn resolve_activation_session_id<'a>(inputs: &ActivationInputs<'a>) -> Option<String> {
    let is_open = |id: &str| inputs.open.iter().any(|open| *open == id);
    let open_choice = |id: Option<&'a str>| id.map(str::trim).filter(|id| !id.is_empty() && is_open(*id));

    let preferred = match inputs.focus_policy {
        FocusPolicy::Explicit => inputs.focus_session_id,
        FocusPolicy::FirstNew => inputs.first_new,
        FocusPolicy::LastNew => inputs.last_new,
        FocusPolicy::PreserveActive => inputs.previous_active,
    };

    open_choice(preferred)
        .or_else(|| inputs.request_ordered.iter().rev().copied().find(|id| is_open(*id)))
        .or_else(|| open_choice(inputs.current_active))
        .or_else(|| inputs.open.first().copied())
        .map(str::to_string)
}
