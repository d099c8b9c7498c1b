//! Lifecycle services
//!
//! Each service composes the pure lifecycle rules with the repository and
//! the collaborators (AI service, notifier, file store). Handlers call these
//! and nothing below them.

pub mod accounts;
pub mod assistant;
pub mod authors;
pub mod documents;
pub mod verification;

pub use accounts::AccountService;
pub use assistant::AssistantService;
pub use authors::AuthorService;
pub use documents::DocumentService;
pub use verification::VerificationService;

use crate::ai::AiService;
use crate::auth::JwtManager;
use crate::config::AppConfig;
use crate::db::Repository;
use crate::notify::Notifier;
use crate::storage::FileStore;
use serde::Serialize;
use std::sync::Arc;

/// Default page size for list queries
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Largest page a caller may ask for
pub const MAX_PAGE_SIZE: u64 = 100;

/// 1-based page request, clamped to sane bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(request: PageRequest, total: u64) -> Self {
        Self {
            page: request.page,
            limit: request.limit,
            total,
            pages: total.div_ceil(request.limit),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

/// Everything the services are built from
#[derive(Clone)]
pub struct ServiceDeps {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub jwt: Arc<JwtManager>,
    pub ai: Arc<dyn AiService>,
    pub notifier: Arc<dyn Notifier>,
    pub files: Arc<dyn FileStore>,
}

/// The full set of services, cheap to clone
#[derive(Clone)]
pub struct Services {
    pub accounts: AccountService,
    pub documents: DocumentService,
    pub verification: VerificationService,
    pub assistant: AssistantService,
    pub authors: AuthorService,
}

impl Services {
    pub fn new(deps: ServiceDeps) -> Self {
        Self {
            accounts: AccountService::new(&deps),
            documents: DocumentService::new(&deps),
            verification: VerificationService::new(&deps),
            assistant: AssistantService::new(&deps),
            authors: AuthorService::new(&deps),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory fixtures shared by the service tests

    use super::*;
    use crate::ai::MockAiService;
    use crate::config::DatabaseConfig;
    use crate::db::{DbPool, NewAccount};
    use crate::db::models::Account;
    use crate::lifecycle::Role;
    use crate::notify::RecordingNotifier;
    use crate::storage::MemoryFileStore;

    pub struct Harness {
        pub services: Services,
        pub repo: Repository,
        pub ai: Arc<MockAiService>,
        pub notifier: Arc<RecordingNotifier>,
        pub files: Arc<MemoryFileStore>,
    }

    pub async fn harness() -> Harness {
        harness_with(MockAiService::new()).await
    }

    pub async fn harness_with(ai: MockAiService) -> Harness {
        let pool = DbPool::new(&DatabaseConfig::in_memory()).await.unwrap();
        pool.migrate().await.unwrap();
        let repo = Repository::new(pool);

        let ai = Arc::new(ai);
        let notifier = Arc::new(RecordingNotifier::new());
        let files = Arc::new(MemoryFileStore::new());

        let deps = ServiceDeps {
            config: Arc::new(AppConfig::default()),
            repo: repo.clone(),
            jwt: Arc::new(JwtManager::new("test-secret", 3600)),
            ai: ai.clone(),
            notifier: notifier.clone(),
            files: files.clone(),
        };

        Harness {
            services: Services::new(deps),
            repo,
            ai,
            notifier,
            files,
        }
    }

    impl Harness {
        /// Account inserted directly with the given role
        pub async fn account(&self, email: &str, role: Role) -> Account {
            self.repo
                .create_account(NewAccount {
                    name: email.split('@').next().unwrap_or("user").to_string(),
                    email: email.to_string(),
                    password_hash: crate::auth::hash_password("password123").unwrap(),
                    role,
                    email_verified: true,
                })
                .await
                .unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_bounds() {
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, limit: 10 });
        assert_eq!(PageRequest::new(Some(0), Some(0)), PageRequest { page: 1, limit: 1 });
        assert_eq!(PageRequest::new(Some(3), Some(1000)).limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_pagination_pages_round_up() {
        let p = Pagination::new(PageRequest::new(Some(1), Some(10)), 21);
        assert_eq!(p.pages, 3);
        assert_eq!(Pagination::new(PageRequest::default(), 0).pages, 0);
    }
}
