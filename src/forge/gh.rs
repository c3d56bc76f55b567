//! `gh` CLI implementation of [`Forge`].
//!
//! Issues go through `gh issue ...`. The project board goes through
//! `gh api graphql`, since `gh issue` does not expose single-select fields.
//! An optional dedicated `GH_CONFIG_DIR` routes credentials.

use std::path::PathBuf;
use std::process::Command;

use jiff::Timestamp;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::ProjectConfig;
use crate::model::{Comment, ItemState, ProjectStatus, WorkItem, WorkItemId};

use super::{Forge, ForgeError};

/// Talks to GitHub through the `gh` CLI.
pub struct GhCli {
    gh_config: Option<PathBuf>,
    project: ProjectConfig,
}

impl GhCli {
    pub fn new(gh_config: Option<PathBuf>, project: ProjectConfig) -> Self {
        Self { gh_config, project }
    }

    /// `gh --version`, first line.
    pub fn version(&self) -> Result<String, ForgeError> {
        let out = self.gh(&["--version"])?;
        Ok(out.lines().next().unwrap_or_default().to_string())
    }

    /// `gh auth status`; succeeds only when a token is configured.
    pub fn auth_status(&self) -> Result<(), ForgeError> {
        self.gh(&["auth", "status"]).map(|_| ())
    }

    /// Run `gh` with the given args and return stdout.
    fn gh(&self, args: &[&str]) -> Result<String, ForgeError> {
        tracing::debug!(args = ?args, "gh");

        let mut cmd = Command::new("gh");
        cmd.args(args);
        if let Some(dir) = &self.gh_config {
            cmd.env("GH_CONFIG_DIR", dir);
        }

        let output = cmd.output().map_err(ForgeError::Spawn)?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(ForgeError::Failed {
                command: args.iter().take(2).copied().collect::<Vec<_>>().join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Run a GraphQL document through `gh api graphql`.
    fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        vars: &[(&str, Var<'_>)],
    ) -> Result<T, ForgeError> {
        let query_arg = format!("query={query}");
        let var_args: Vec<(&str, String)> = vars
            .iter()
            .map(|(name, value)| match value {
                Var::Str(s) => ("-f", format!("{name}={s}")),
                Var::Int(n) => ("-F", format!("{name}={n}")),
            })
            .collect();

        let mut args = vec!["api", "graphql", "-f", query_arg.as_str()];
        for (flag, arg) in &var_args {
            args.push(*flag);
            args.push(arg.as_str());
        }

        let json = self.gh(&args)?;
        let response: GraphQlResponse<T> = serde_json::from_str(&json)?;

        if let Some(err) = response.errors.first() {
            return Err(ForgeError::Project(err.message.clone()));
        }
        response
            .data
            .ok_or_else(|| ForgeError::Project("empty GraphQL response".to_string()))
    }

    /// The issue's node id and its item on the configured board, if any.
    fn find_project_item(&self, id: &WorkItemId) -> Result<IssueProjectItems, ForgeError> {
        let (owner, name) = split_repo(&id.repo)?;
        let data: RepositoryData = self.graphql(
            ISSUE_PROJECT_ITEMS,
            &[
                ("owner", Var::Str(owner)),
                ("name", Var::Str(name)),
                ("number", Var::Int(id.number)),
                ("field", Var::Str(&self.project.status_field)),
            ],
        )?;

        data.repository
            .and_then(|r| r.issue)
            .ok_or_else(|| ForgeError::Project(format!("issue {id} not found")))
    }

    fn board_item<'a>(&self, issue: &'a IssueProjectItems) -> Option<&'a GhProjectItem> {
        issue.project_items.nodes.iter().find(|node| {
            node.project.number == self.project.number
                && node
                    .project
                    .owner
                    .login
                    .as_deref()
                    .is_some_and(|l| l.eq_ignore_ascii_case(&self.project.owner))
        })
    }

    fn board(&self) -> Result<GhProject, ForgeError> {
        let data: OwnerData = self.graphql(
            PROJECT_FIELDS,
            &[
                ("owner", Var::Str(&self.project.owner)),
                ("number", Var::Int(self.project.number)),
                ("field", Var::Str(&self.project.status_field)),
            ],
        )?;

        data.repository_owner
            .and_then(|o| o.project_v2)
            .ok_or_else(|| {
                ForgeError::Project(format!(
                    "project {}/{} not found",
                    self.project.owner, self.project.number
                ))
            })
    }
}

impl Forge for GhCli {
    fn list_issues(&self, repo: &str, label: &str) -> Result<Vec<WorkItem>, ForgeError> {
        let limit = ISSUE_LIMIT.to_string();
        let json = self.gh(&[
            "issue",
            "list",
            "--repo",
            repo,
            "--label",
            label,
            "--state",
            "open",
            "--limit",
            &limit,
            "--json",
            "number,title,body,labels,assignees,url",
        ])?;

        let issues: Vec<GhIssueListing> = serde_json::from_str(&json)?;
        if truncated(issues.len()) {
            tracing::warn!(
                repo,
                label,
                limit = ISSUE_LIMIT,
                "issue listing hit the limit; older issues were not fetched"
            );
        }
        Ok(issues
            .into_iter()
            .map(|i| WorkItem {
                id: WorkItemId::new(repo, i.number),
                title: i.title,
                body: i.body,
                labels: i.labels.into_iter().map(|l| l.name).collect(),
                assignees: i.assignees.into_iter().map(|a| a.login).collect(),
                comments: Vec::new(),
                url: i.url,
            })
            .collect())
    }

    fn issue_comments(&self, id: &WorkItemId) -> Result<Vec<Comment>, ForgeError> {
        let num = id.number.to_string();
        let json = self.gh(&[
            "issue", "view", &num, "--repo", &id.repo, "--json", "comments",
        ])?;

        let view: GhIssueComments = serde_json::from_str(&json)?;
        Ok(view.comments.into_iter().map(GhComment::into_comment).collect())
    }

    fn item_state(&self, id: &WorkItemId) -> Result<ItemState, ForgeError> {
        let num = id.number.to_string();
        let json = self.gh(&[
            "issue",
            "view",
            &num,
            "--repo",
            &id.repo,
            "--json",
            "state,assignees,comments",
        ])?;

        let view: GhIssueState = serde_json::from_str(&json)?;
        Ok(ItemState {
            open: view.state.eq_ignore_ascii_case("open"),
            assignees: view.assignees.into_iter().map(|a| a.login).collect(),
            comments: view
                .comments
                .into_iter()
                .map(GhComment::into_comment)
                .collect(),
        })
    }

    fn project_status(&self, id: &WorkItemId) -> Result<Option<ProjectStatus>, ForgeError> {
        let issue = self.find_project_item(id)?;
        Ok(self
            .board_item(&issue)
            .and_then(|item| item.field_value_by_name.as_ref())
            .and_then(|value| {
                value.name.clone().map(|name| ProjectStatus {
                    name,
                    since: value.updated_at,
                })
            }))
    }

    fn add_assignee(&self, id: &WorkItemId, login: &str) -> Result<(), ForgeError> {
        let num = id.number.to_string();
        self.gh(&[
            "issue",
            "edit",
            &num,
            "--repo",
            &id.repo,
            "--add-assignee",
            login,
        ])
        .map(|_| ())
    }

    fn add_comment(&self, id: &WorkItemId, body: &str) -> Result<(), ForgeError> {
        let num = id.number.to_string();
        self.gh(&[
            "issue", "comment", &num, "--repo", &id.repo, "--body", body,
        ])
        .map(|_| ())
    }

    fn close_issue(&self, id: &WorkItemId, reason: &str) -> Result<(), ForgeError> {
        let num = id.number.to_string();
        self.gh(&[
            "issue", "close", &num, "--repo", &id.repo, "--reason", reason,
        ])
        .map(|_| ())
    }

    fn set_project_status(&self, id: &WorkItemId, status: &str) -> Result<(), ForgeError> {
        let board = self.board()?;
        let field = board.field.as_ref().ok_or_else(|| {
            ForgeError::Project(format!(
                "field '{}' not found on project",
                self.project.status_field
            ))
        })?;
        let option = field
            .options
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case(status))
            .ok_or_else(|| ForgeError::Project(format!("no '{status}' option on status field")))?;

        let issue = self.find_project_item(id)?;
        let item_id = match self.board_item(&issue) {
            Some(item) => item.id.clone(),
            None => {
                tracing::debug!(item = %id, "adding to project board");
                let added: AddItemData = self.graphql(
                    ADD_PROJECT_ITEM,
                    &[
                        ("project", Var::Str(&board.id)),
                        ("content", Var::Str(&issue.id)),
                    ],
                )?;
                added.add_project_v2_item_by_id.item.id
            }
        };

        let _: serde_json::Value = self.graphql(
            UPDATE_STATUS,
            &[
                ("project", Var::Str(&board.id)),
                ("item", Var::Str(&item_id)),
                ("field", Var::Str(&field.id)),
                ("option", Var::Str(&option.id)),
            ],
        )?;
        Ok(())
    }
}

/// Most issues `gh issue list` returns per repository.
const ISSUE_LIMIT: usize = 200;

/// `gh` stops silently at the limit, so a full page may hide more issues.
fn truncated(count: usize) -> bool {
    count >= ISSUE_LIMIT
}

/// A GraphQL variable: `-f` for strings, `-F` for typed values.
enum Var<'a> {
    Str(&'a str),
    Int(u64),
}

fn split_repo(repo: &str) -> Result<(&str, &str), ForgeError> {
    repo.split_once('/')
        .ok_or_else(|| ForgeError::Project(format!("'{repo}' is not owner/name")))
}

// ── GraphQL documents ──

const ISSUE_PROJECT_ITEMS: &str = r"
query($owner: String!, $name: String!, $number: Int!, $field: String!) {
  repository(owner: $owner, name: $name) {
    issue(number: $number) {
      id
      projectItems(first: 50) {
        nodes {
          id
          project {
            number
            owner { ... on Organization { login } ... on User { login } }
          }
          fieldValueByName(name: $field) {
            ... on ProjectV2ItemFieldSingleSelectValue { name updatedAt }
          }
        }
      }
    }
  }
}";

const PROJECT_FIELDS: &str = r"
query($owner: String!, $number: Int!, $field: String!) {
  repositoryOwner(login: $owner) {
    ... on Organization { projectV2(number: $number) { ...board } }
    ... on User { projectV2(number: $number) { ...board } }
  }
}
fragment board on ProjectV2 {
  id
  field(name: $field) {
    ... on ProjectV2SingleSelectField { id options { id name } }
  }
}";

const ADD_PROJECT_ITEM: &str = r"
mutation($project: ID!, $content: ID!) {
  addProjectV2ItemById(input: { projectId: $project, contentId: $content }) {
    item { id }
  }
}";

const UPDATE_STATUS: &str = r"
mutation($project: ID!, $item: ID!, $field: ID!, $option: String!) {
  updateProjectV2ItemFieldValue(input: {
    projectId: $project, itemId: $item, fieldId: $field,
    value: { singleSelectOptionId: $option }
  }) {
    projectV2Item { id }
  }
}";

// ── JSON shapes ──

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct RepositoryData {
    repository: Option<RepositoryIssue>,
}

#[derive(Deserialize)]
struct RepositoryIssue {
    issue: Option<IssueProjectItems>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueProjectItems {
    id: String,
    project_items: GhNodes<GhProjectItem>,
}

#[derive(Deserialize)]
struct GhNodes<T> {
    nodes: Vec<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhProjectItem {
    id: String,
    project: GhProjectRef,
    field_value_by_name: Option<GhStatusValue>,
}

#[derive(Deserialize)]
struct GhProjectRef {
    number: u64,
    owner: GhOwner,
}

#[derive(Deserialize)]
struct GhOwner {
    login: Option<String>,
}

/// Empty object when the field is not single-select.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhStatusValue {
    name: Option<String>,
    updated_at: Option<Timestamp>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerData {
    repository_owner: Option<OwnerProject>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerProject {
    project_v2: Option<GhProject>,
}

#[derive(Deserialize)]
struct GhProject {
    id: String,
    field: Option<GhStatusField>,
}

#[derive(Deserialize)]
struct GhStatusField {
    id: String,
    options: Vec<GhOption>,
}

#[derive(Deserialize)]
struct GhOption {
    id: String,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddItemData {
    add_project_v2_item_by_id: AddedItem,
}

#[derive(Deserialize)]
struct AddedItem {
    item: GhId,
}

#[derive(Deserialize)]
struct GhId {
    id: String,
}

/// JSON shape for `gh issue list --json`.
#[derive(Deserialize)]
struct GhIssueListing {
    number: u64,
    title: String,
    #[serde(default)]
    body: String,
    labels: Vec<GhLabel>,
    assignees: Vec<GhActor>,
    url: String,
}

#[derive(Deserialize)]
struct GhActor {
    login: String,
}

#[derive(Deserialize)]
struct GhLabel {
    name: String,
}

/// JSON shape for `gh issue view --json comments`.
#[derive(Deserialize)]
struct GhIssueComments {
    comments: Vec<GhComment>,
}

/// JSON shape for `gh issue view --json state,assignees,comments`.
#[derive(Deserialize)]
struct GhIssueState {
    state: String,
    assignees: Vec<GhActor>,
    comments: Vec<GhComment>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhComment {
    /// Null for deleted accounts.
    author: Option<GhActor>,
    body: String,
    created_at: Timestamp,
}

impl GhComment {
    fn into_comment(self) -> Comment {
        Comment {
            author: self.author.map_or_else(|| "ghost".to_string(), |a| a.login),
            body: self.body,
            created_at: self.created_at,
        }
    }
}
