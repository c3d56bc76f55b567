//! Shared fixtures for unit tests: sample items, a policy, and in-memory
//! collaborators that record every mutating call.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use jiff::Timestamp;
use tempfile::TempDir;

use crate::artifact::ArtifactStore;
use crate::classify::ReviewPolicy;
use crate::config::Config;
use crate::execute::Mode;
use crate::forge::{Forge, ForgeError};
use crate::model::{Comment, EnrichedItem, ItemState, ProjectStatus, WorkItem, WorkItemId};
use crate::notify::{Notifier, NotifyError};
use crate::steps::StepContext;

pub const REPO: &str = "octo/widgets";

pub const CONFIG: &str = r#"
    identity = "shepherd-bot"

    [review]
    repos = ["octo/widgets"]
    label = "namespace-review"
    reviewer = "alice"

    [project]
    owner = "octo"
    number = 12

    [notify]
    webhook = "https://hooks.example.com/shepherd"
    escalation-recipients = ["board@example.com"]
"#;

pub fn config() -> Config {
    toml::from_str(CONFIG).unwrap()
}

pub fn policy() -> ReviewPolicy {
    ReviewPolicy::from_config(&config()).unwrap()
}

pub fn timestamp(s: &str) -> Timestamp {
    s.parse().unwrap()
}

pub fn enriched(number: u64) -> EnrichedItem {
    EnrichedItem {
        item: WorkItem {
            id: WorkItemId::new(REPO, number),
            title: format!("Namespace review #{number}"),
            body: "Namespace: Octo.Widgets".into(),
            labels: vec!["namespace-review".into()],
            assignees: vec![],
            comments: vec![],
            url: format!("https://github.com/{REPO}/issues/{number}"),
        },
        project_status: None,
    }
}

pub fn with_assignee(mut entry: EnrichedItem, login: &str) -> EnrichedItem {
    entry.item.assignees.push(login.to_string());
    entry
}

pub fn with_label(mut entry: EnrichedItem, label: &str) -> EnrichedItem {
    entry.item.labels.push(label.to_string());
    entry
}

/// Assigned to the reviewer and on watch since `since`.
pub fn watching_since(entry: EnrichedItem, since: Timestamp) -> EnrichedItem {
    let mut entry = with_assignee(entry, "alice");
    entry.project_status = Some(ProjectStatus {
        name: "Watching".into(),
        since: Some(since),
    });
    entry
}

pub fn comment_at(author: &str, body: &str, at: Timestamp) -> Comment {
    Comment {
        author: author.into(),
        body: body.into(),
        created_at: at,
    }
}

fn failure(what: &str) -> ForgeError {
    ForgeError::Failed {
        command: what.to_string(),
        stderr: "HTTP 403: rate limit exceeded".to_string(),
    }
}

/// In-memory forge. Mutations update its state, so a second pass sees
/// the effects of the first.
#[derive(Default)]
pub struct StubForge {
    repos: RefCell<BTreeMap<String, Option<Vec<WorkItem>>>>,
    states: RefCell<BTreeMap<WorkItemId, ItemState>>,
    statuses: RefCell<BTreeMap<WorkItemId, ProjectStatus>>,
    failing: RefCell<BTreeSet<WorkItemId>>,
    mutations: RefCell<Vec<String>>,
}

impl StubForge {
    /// Track an item: its live state mirrors the snapshot.
    pub fn track(&self, entry: &EnrichedItem) {
        let item = &entry.item;
        self.states.borrow_mut().insert(
            item.id.clone(),
            ItemState {
                open: true,
                assignees: item.assignees.clone(),
                comments: item.comments.clone(),
            },
        );
        if let Some(status) = &entry.project_status {
            self.statuses
                .borrow_mut()
                .insert(item.id.clone(), status.clone());
        }
        self.repos
            .borrow_mut()
            .entry(item.id.repo.clone())
            .or_insert_with(|| Some(Vec::new()))
            .get_or_insert_with(Vec::new)
            .push(WorkItem {
                comments: Vec::new(),
                ..item.clone()
            });
    }

    /// Listing this repository fails.
    pub fn fail_repo(&self, repo: &str) {
        self.repos.borrow_mut().insert(repo.to_string(), None);
    }

    /// Every call touching this item fails.
    pub fn fail_item(&self, id: &WorkItemId) {
        self.failing.borrow_mut().insert(id.clone());
    }

    /// Every mutating call so far, as `verb repo#number`.
    pub fn mutations(&self) -> Vec<String> {
        self.mutations.borrow().clone()
    }

    pub fn count(&self, verb: &str) -> usize {
        self.mutations
            .borrow()
            .iter()
            .filter(|m| m.starts_with(verb))
            .count()
    }

    pub fn state(&self, id: &WorkItemId) -> Option<ItemState> {
        self.states.borrow().get(id).cloned()
    }

    fn check(&self, id: &WorkItemId, what: &str) -> Result<(), ForgeError> {
        if self.failing.borrow().contains(id) {
            Err(failure(what))
        } else {
            Ok(())
        }
    }

    fn record(&self, verb: &str, id: &WorkItemId) {
        self.mutations.borrow_mut().push(format!("{verb} {id}"));
    }

    fn with_state(&self, id: &WorkItemId, f: impl FnOnce(&mut ItemState)) {
        if let Some(state) = self.states.borrow_mut().get_mut(id) {
            f(state);
        }
    }
}

impl Forge for StubForge {
    fn list_issues(&self, repo: &str, _label: &str) -> Result<Vec<WorkItem>, ForgeError> {
        match self.repos.borrow().get(repo) {
            Some(Some(items)) => Ok(items.clone()),
            Some(None) => Err(failure("issue list")),
            None => Ok(Vec::new()),
        }
    }

    fn issue_comments(&self, id: &WorkItemId) -> Result<Vec<Comment>, ForgeError> {
        self.check(id, "issue view")?;
        Ok(self.state(id).map(|s| s.comments).unwrap_or_default())
    }

    fn item_state(&self, id: &WorkItemId) -> Result<ItemState, ForgeError> {
        self.check(id, "issue view")?;
        self.state(id)
            .ok_or_else(|| ForgeError::Project(format!("unknown item {id}")))
    }

    fn project_status(&self, id: &WorkItemId) -> Result<Option<ProjectStatus>, ForgeError> {
        self.check(id, "api graphql")?;
        Ok(self.statuses.borrow().get(id).cloned())
    }

    fn add_assignee(&self, id: &WorkItemId, login: &str) -> Result<(), ForgeError> {
        self.check(id, "issue edit")?;
        self.record("assign", id);
        self.with_state(id, |s| s.assignees.push(login.to_string()));
        Ok(())
    }

    fn add_comment(&self, id: &WorkItemId, body: &str) -> Result<(), ForgeError> {
        self.check(id, "issue comment")?;
        self.record("comment", id);
        self.with_state(id, |s| {
            s.comments
                .push(comment_at("shepherd-bot", body, Timestamp::now()));
        });
        Ok(())
    }

    fn close_issue(&self, id: &WorkItemId, _reason: &str) -> Result<(), ForgeError> {
        self.check(id, "issue close")?;
        self.record("close", id);
        self.with_state(id, |s| s.open = false);
        Ok(())
    }

    fn set_project_status(&self, id: &WorkItemId, status: &str) -> Result<(), ForgeError> {
        self.check(id, "api graphql")?;
        self.record("status", id);
        self.statuses.borrow_mut().insert(
            id.clone(),
            ProjectStatus {
                name: status.to_string(),
                since: Some(Timestamp::now()),
            },
        );
        Ok(())
    }
}

/// Notifier that records deliveries instead of sending them.
#[derive(Default)]
pub struct StubNotifier {
    sent: RefCell<Vec<String>>,
    fail: bool,
}

impl StubNotifier {
    pub fn failing() -> Self {
        Self {
            sent: RefCell::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.borrow().clone()
    }

    fn deliver(&self, what: String) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Webhook {
                status: 401,
                message: "token expired".to_string(),
            });
        }
        self.sent.borrow_mut().push(what);
        Ok(())
    }
}

impl Notifier for StubNotifier {
    fn send_direct(&self, user: &str, _message: &str) -> Result<(), NotifyError> {
        self.deliver(format!("direct {user}"))
    }

    fn send_email(&self, to: &[String], subject: &str, _body: &str) -> Result<(), NotifyError> {
        self.deliver(format!("email {} {subject}", to.join(",")))
    }
}

/// A step context over a temporary output directory and stub collaborators.
pub struct Harness {
    _dir: TempDir,
    root: PathBuf,
    pub config: Config,
    pub policy: ReviewPolicy,
    pub store: ArtifactStore,
    pub forge: StubForge,
    pub notifier: StubNotifier,
    pub mode: Mode,
    pub now: Timestamp,
    notify: bool,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("output");
        Self {
            store: ArtifactStore::new(&root),
            _dir: dir,
            root,
            config: config(),
            policy: policy(),
            forge: StubForge::default(),
            notifier: StubNotifier::default(),
            mode: Mode::Live,
            now: timestamp("2026-10-16T15:00:00Z"),
            notify: true,
        }
    }

    /// Start a new invocation with a fixed run id over the same output root.
    pub fn start_run(&mut self, id: &str) {
        self.store = ArtifactStore::new(&self.root).with_run_id(Some(id.to_string()));
    }

    pub fn without_notifier(&mut self) {
        self.notify = false;
    }

    pub fn context(&self) -> StepContext<'_> {
        StepContext {
            config: &self.config,
            policy: &self.policy,
            store: &self.store,
            forge: &self.forge,
            notifier: self.notify.then_some(&self.notifier as &dyn Notifier),
            mode: self.mode,
            now: self.now,
        }
    }
}
