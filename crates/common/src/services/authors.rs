//! Author directory: browsing, profiles and admin-curated entries

use super::{Page, PageRequest, Pagination, ServiceDeps, MAX_PAGE_SIZE};
use crate::db::models::{Author, Document, StringList};
use crate::db::{AuthorQuery, NewAuthor, Repository};
use crate::errors::{AppError, Result};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Directory page size when the caller gives none
pub const DEFAULT_AUTHOR_PAGE_SIZE: u64 = 20;

/// Entries on the top-authors board when the caller gives no limit
pub const DEFAULT_TOP_AUTHORS: u64 = 10;

/// Fields an admin supplies for a directory entry
#[derive(Debug, Clone, Default)]
pub struct AuthorInput {
    pub name: String,
    pub email: Option<String>,
    pub affiliation: Option<String>,
    pub bio: Option<String>,
    /// Comma separated
    pub research_interests: Option<String>,
}

/// An author together with their published documents
#[derive(Debug, Clone, Serialize)]
pub struct AuthorProfile {
    #[serde(flatten)]
    pub author: Author,
    pub publications: Vec<Document>,
}

#[derive(Clone)]
pub struct AuthorService {
    repo: Repository,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AuthorService {
    pub fn new(deps: &ServiceDeps) -> Self {
        Self {
            repo: deps.repo.clone(),
        }
    }

    pub async fn list(&self, query: &AuthorQuery, page: PageRequest) -> Result<Page<Author>> {
        let (items, total) = self.repo.list_authors(query, page.page, page.limit).await?;
        Ok(Page {
            items,
            pagination: Pagination::new(page, total),
        })
    }

    pub async fn top(&self, limit: Option<u64>) -> Result<Vec<Author>> {
        let limit = limit.unwrap_or(DEFAULT_TOP_AUTHORS).clamp(1, MAX_PAGE_SIZE);
        self.repo.top_authors(limit).await
    }

    pub async fn profile(&self, id: Uuid) -> Result<AuthorProfile> {
        let author = self
            .repo
            .find_author_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("Author", id))?;
        let publications = self.repo.publications_of(&author.name).await?;
        Ok(AuthorProfile {
            author,
            publications,
        })
    }

    /// Return the entry with this name, creating it first if needed.
    /// The flag is true when a new entry was written.
    pub async fn create_or_get(&self, input: AuthorInput) -> Result<(Author, bool)> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("name", "Author name is required"));
        }

        let (author, created) = self
            .repo
            .create_or_get_author(NewAuthor {
                name,
                email: non_empty(input.email).map(|e| e.to_lowercase()),
                affiliation: non_empty(input.affiliation),
                bio: non_empty(input.bio),
                research_interests: input
                    .research_interests
                    .as_deref()
                    .map(StringList::from_csv)
                    .unwrap_or_default(),
            })
            .await?;

        if created {
            info!(author_id = %author.id, name = %author.name, "Author added to directory");
        }
        Ok((author, created))
    }
}
