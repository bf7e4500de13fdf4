// Repository interfaces for tasks and users, with in-memory implementations
//
// TaskStore is the only place a task record changes. Every update is a
// compare-and-swap against the version the caller read.

use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::error::{WorkflowError, WorkflowResult};
use super::types::{Role, Task, User};

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TaskRepository: Send + Sync {
    fn get(&self, id: &str) -> Option<Task>;

    fn contains(&self, id: &str) -> bool;

    /// All tasks ordered by creation time
    fn list(&self) -> Vec<Task>;

    /// Insert a new task. Fails if the id is already taken.
    fn create(&self, task: Task) -> WorkflowResult<Task>;

    /// Replace the stored task if its version still equals `expected_version`.
    /// Returns the stored record with its version bumped.
    fn compare_and_swap(&self, task: Task, expected_version: u64) -> WorkflowResult<Task>;
}

pub trait UserDirectory: Send + Sync {
    fn get(&self, id: &str) -> Option<User>;

    fn find_by_email(&self, email: &str) -> Option<User>;

    fn with_role(&self, role: Role) -> Vec<User>;

    fn list(&self) -> Vec<User>;
}

#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<BTreeMap<String, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load previously persisted tasks as-is, keeping their versions
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let map = tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        Self {
            tasks: RwLock::new(map),
        }
    }
}

impl TaskRepository for InMemoryTaskStore {
    fn get(&self, id: &str) -> Option<Task> {
        self.tasks.read().get(id).cloned()
    }

    fn contains(&self, id: &str) -> bool {
        self.tasks.read().contains_key(id)
    }

    fn list(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.read().values().cloned().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        tasks
    }

    fn create(&self, task: Task) -> WorkflowResult<Task> {
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&task.id) {
            return Err(WorkflowError::Validation(format!(
                "task id {} already exists",
                task.id
            )));
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    fn compare_and_swap(&self, mut task: Task, expected_version: u64) -> WorkflowResult<Task> {
        let mut tasks = self.tasks.write();
        let stored = tasks
            .get(&task.id)
            .ok_or_else(|| WorkflowError::UnknownTask(task.id.clone()))?;

        if stored.version != expected_version {
            return Err(WorkflowError::Conflict {
                task_id: task.id.clone(),
                expected: expected_version,
                found: stored.version,
            });
        }
        if stored.is_approved() {
            return Err(WorkflowError::invalid_state(
                &stored.id,
                stored.status,
                "modify an approved task",
            ));
        }

        task.version = expected_version + 1;
        tasks.insert(task.id.clone(), task.clone());
        Ok(task)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: Vec<User>,
}

impl InMemoryUserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }

    /// The three demo accounts the approval desk ships with
    pub fn demo_users() -> Vec<User> {
        vec![
            User::new("u_admin", "Abe Admin", "abe@icog.test", Role::Admin),
            User::new(
                "u_reviewer1",
                "Miriam Reviewer",
                "miriam@icog.test",
                Role::Reviewer,
            ),
            User::new(
                "u_marketing",
                "Selam Marketing",
                "selam@marketing.icog.test",
                Role::Department,
            )
            .with_department("Marketing"),
        ]
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn get(&self, id: &str) -> Option<User> {
        self.users.iter().find(|u| u.id == id).cloned()
    }

    fn find_by_email(&self, email: &str) -> Option<User> {
        let email = email.trim();
        self.users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    fn with_role(&self, role: Role) -> Vec<User> {
        self.users.iter().filter(|u| u.role == role).cloned().collect()
    }

    fn list(&self) -> Vec<User> {
        self.users.clone()
    }
}
