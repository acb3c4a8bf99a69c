//! Issue payloads and responses

use serde::Deserialize;
use serde_json::{json, Value};

use triad_core::tracker::{IssueDetails, NewIssue};

use crate::{Error, Result};

/// Fields for a create-issue request
pub(crate) fn create_fields(issue: &NewIssue, project: &str, account_id: Option<&str>) -> Value {
    let issue_type = match issue.issue_type.trim() {
        "" => "Task",
        other => other,
    };
    let mut fields = json!({
        "project": {"key": project},
        "summary": issue.summary,
        "description": issue.full_description(),
        "issuetype": {"name": issue_type},
    });
    if let Some(id) = account_id {
        fields["assignee"] = json!({"accountId": id});
    }
    json!({ "fields": fields })
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedKey {
    pub key: String,
}

/// Flatten an issue response into the fields the agents see
pub(crate) fn issue_details(issue: &Value) -> Result<IssueDetails> {
    let key = issue["key"]
        .as_str()
        .ok_or_else(|| Error::Parse("issue response has no key".to_string()))?;
    let fields = &issue["fields"];
    let text = |v: &Value| v.as_str().unwrap_or_default().to_string();

    Ok(IssueDetails {
        key: key.to_string(),
        summary: text(&fields["summary"]),
        description: text(&fields["description"]),
        status: text(&fields["status"]["name"]),
        issue_type: text(&fields["issuetype"]["name"]),
        assignee: fields["assignee"]["displayName"]
            .as_str()
            .unwrap_or("Unassigned")
            .to_string(),
    })
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Transition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub to: Option<TransitionTarget>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TransitionTarget {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Transitions {
    pub transitions: Vec<Transition>,
}

/// Find the transition whose name or target status matches, ignoring case
pub(crate) fn pick_transition<'a>(
    transitions: &'a [Transition],
    key: &str,
    status: &str,
) -> Result<&'a Transition> {
    let wanted = status.trim();
    transitions
        .iter()
        .find(|t| {
            t.name.eq_ignore_ascii_case(wanted)
                || t.to
                    .as_ref()
                    .is_some_and(|to| to.name.eq_ignore_ascii_case(wanted))
        })
        .ok_or_else(|| Error::NoTransition {
            key: key.to_string(),
            status: wanted.to_string(),
            available: transitions
                .iter()
                .map(|t| t.to.as_ref().map_or(t.name.as_str(), |to| to.name.as_str()))
                .collect::<Vec<_>>()
                .join(", "),
        })
}
