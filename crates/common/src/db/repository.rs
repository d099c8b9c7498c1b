//! Repository pattern for database operations
//!
//! Every lifecycle decision is written as a conditional update on the
//! status the caller observed, so two racing decisions cannot both land.
//! Verification transitions also update the owning account inside the same
//! transaction.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::lifecycle::document::{DecisionOutcome, DocumentState};
use crate::lifecycle::verification::{
    AcademicPosition, IdType, ReviewAction, StatusHistoryEntry, SubmissionPlan,
};
use crate::lifecycle::{
    AccountVerificationStatus, ApprovalStatus, DocumentStatus, Role, StatusHistory,
    VerificationStatus,
};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Alias, Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    TransactionTrait, Unchanged,
};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

/// Fields for a new account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub email_verified: bool,
}

/// Fields for a freshly uploaded document
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub tags: StringList,
    pub file_url: String,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub metadata: DocumentMetadata,
    pub state: DocumentState,
    pub uploaded_by: Uuid,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DocumentSort {
    #[default]
    Recent,
    Views,
    Downloads,
}

impl FromStr for DocumentSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "recent" => Ok(DocumentSort::Recent),
            "views" => Ok(DocumentSort::Views),
            "downloads" => Ok(DocumentSort::Downloads),
            other => Err(AppError::validation("sort", format!("Unknown sort '{}'", other))),
        }
    }
}

/// Filters for the published catalogue
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: DocumentSort,
}

/// Applicant-supplied fields of a verification request
#[derive(Debug, Clone)]
pub struct SubmissionFields {
    pub full_name: String,
    pub date_of_birth: Option<String>,
    pub id_type: IdType,
    pub id_number: String,
    pub institution: String,
    pub department: Option<String>,
    pub position: Option<AcademicPosition>,
    pub research_areas: StringList,
    pub orcid_id: Option<String>,
    pub google_scholar_id: Option<String>,
    pub linkedin_profile: Option<String>,
    pub personal_website: Option<String>,
    pub id_document_url: String,
    pub profile_photo_url: String,
}

/// Fields for a new author directory entry
#[derive(Debug, Clone)]
pub struct NewAuthor {
    pub name: String,
    pub email: Option<String>,
    pub affiliation: Option<String>,
    pub bio: Option<String>,
    pub research_interests: StringList,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthorSort {
    #[default]
    Citations,
    HIndex,
    Name,
}

impl FromStr for AuthorSort {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "citationCount" | "citations" => Ok(AuthorSort::Citations),
            "hIndex" => Ok(AuthorSort::HIndex),
            "name" => Ok(AuthorSort::Name),
            other => Err(AppError::validation("sort", format!("Unknown sort '{}'", other))),
        }
    }
}

/// Filters for the author directory
#[derive(Debug, Clone, Default)]
pub struct AuthorQuery {
    pub search: Option<String>,
    pub sort: AuthorSort,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Account Operations
    // ========================================================================

    /// Insert an account. A taken email is a conflict.
    pub async fn create_account(&self, new: NewAccount) -> Result<Account> {
        let now = Utc::now();

        let account = AccountActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(new.name),
            email: Set(new.email),
            password_hash: Set(new.password_hash),
            role: Set(new.role),
            verification_status: Set(AccountVerificationStatus::Unverified),
            verification_request_id: Set(None),
            email_verified: Set(new.email_verified),
            email_otp_hash: Set(None),
            email_otp_issued_at: Set(None),
            email_otp_expires_at: Set(None),
            reset_otp_hash: Set(None),
            reset_otp_expires_at: Set(None),
            institution: Set(None),
            department: Set(None),
            position: Set(None),
            orcid_id: Set(None),
            google_scholar_id: Set(None),
            linkedin_profile: Set(None),
            profile_photo: Set(None),
            research_areas: Set(StringList::default()),
            login_history: Set(LoginHistory::default()),
            search_history: Set(SearchHistory::default()),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        account.insert(self.write_conn()).await.map_err(|e| {
            if is_unique_violation(&e) {
                AppError::conflict("An account with this email already exists")
            } else {
                e.into()
            }
        })
    }

    pub async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        AccountEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Lookup by an already normalized (lower-cased) email
    pub async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        AccountEntity::find()
            .filter(AccountColumn::Email.eq(email))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn load_account(&self, id: Uuid) -> Result<AccountActiveModel> {
        AccountEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .map(Into::into)
            .ok_or_else(|| AppError::not_found("Account", id))
    }

    /// Replace the email verification code
    pub async fn set_email_otp(
        &self,
        id: Uuid,
        otp_hash: String,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut account = self.load_account(id).await?;
        account.email_otp_hash = Set(Some(otp_hash));
        account.email_otp_issued_at = Set(Some(issued_at));
        account.email_otp_expires_at = Set(Some(expires_at));
        account.updated_at = Set(Utc::now());
        account.update(self.write_conn()).await?;
        Ok(())
    }

    /// Flag the email as verified and clear the code
    pub async fn mark_email_verified(&self, id: Uuid) -> Result<Account> {
        let mut account = self.load_account(id).await?;
        account.email_verified = Set(true);
        account.email_otp_hash = Set(None);
        account.email_otp_expires_at = Set(None);
        account.updated_at = Set(Utc::now());
        account.update(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn set_reset_otp(
        &self,
        id: Uuid,
        otp_hash: String,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut account = self.load_account(id).await?;
        account.reset_otp_hash = Set(Some(otp_hash));
        account.reset_otp_expires_at = Set(Some(expires_at));
        account.updated_at = Set(Utc::now());
        account.update(self.write_conn()).await?;
        Ok(())
    }

    /// Store a new password hash and burn the reset code
    pub async fn update_password(&self, id: Uuid, password_hash: String) -> Result<()> {
        let mut account = self.load_account(id).await?;
        account.password_hash = Set(password_hash);
        account.reset_otp_hash = Set(None);
        account.reset_otp_expires_at = Set(None);
        account.updated_at = Set(Utc::now());
        account.update(self.write_conn()).await?;
        Ok(())
    }

    pub async fn record_login(&self, id: Uuid, entry: LoginEntry) -> Result<Account> {
        let current = AccountEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("Account", id))?;

        let mut account: AccountActiveModel = current.clone().into();
        account.last_login_at = Set(Some(entry.timestamp));
        account.login_history = Set(current.login_history.pushed(entry));
        account.update(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn append_search_history(&self, id: Uuid, query: &str) -> Result<()> {
        let current = AccountEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::not_found("Account", id))?;

        let entry = SearchEntry {
            query: query.to_string(),
            timestamp: Utc::now(),
        };
        let mut account: AccountActiveModel = current.clone().into();
        account.search_history = Set(current.search_history.pushed(entry));
        account.update(self.write_conn()).await?;
        Ok(())
    }

    // ========================================================================
    // Document Operations
    // ========================================================================

    pub async fn create_document(&self, new: NewDocument) -> Result<Document> {
        let now = Utc::now();
        let approved = new.state.approval_status == ApprovalStatus::Approved;

        let document = DocumentActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(new.title),
            description: Set(new.description),
            author: Set(new.author),
            category: Set(new.category),
            tags: Set(new.tags),
            file_url: Set(new.file_url),
            file_name: Set(new.file_name),
            file_size: Set(new.file_size),
            mime_type: Set(new.mime_type),
            extracted_text: Set(None),
            summary: Set(None),
            metadata: Set(new.metadata),
            status: Set(new.state.status),
            approval_status: Set(new.state.approval_status),
            uploaded_by: Set(new.uploaded_by),
            approved_by: Set(approved.then_some(new.uploaded_by)),
            approved_at: Set(approved.then_some(now)),
            rejection_reason: Set(None),
            processed_at: Set(None),
            view_count: Set(0),
            download_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        document.insert(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn find_document_by_id(&self, id: Uuid) -> Result<Option<Document>> {
        DocumentEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Published documents matching the filters, one page at a time
    pub async fn list_published(
        &self,
        query: &DocumentQuery,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<Document>, u64)> {
        let mut select = DocumentEntity::find()
            .filter(DocumentColumn::Status.eq(DocumentStatus::Published));

        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            select = select.filter(DocumentColumn::Category.eq(category));
        }
        if let Some(search) = query.search.as_deref() {
            if let Some(condition) = keyword_condition(search) {
                select = select.filter(condition);
            }
        }

        select = match query.sort {
            DocumentSort::Recent => select,
            DocumentSort::Views => select.order_by_desc(DocumentColumn::ViewCount),
            DocumentSort::Downloads => select.order_by_desc(DocumentColumn::DownloadCount),
        };

        let paginator = select
            .order_by_desc(DocumentColumn::CreatedAt)
            .paginate(self.read_conn(), limit);

        let total = paginator.num_items().await?;
        let documents = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((documents, total))
    }

    /// Keyword match over published documents; the semantic search fallback
    pub async fn keyword_search(&self, text: &str, limit: u64) -> Result<Vec<Document>> {
        let Some(condition) = keyword_condition(text) else {
            return Ok(Vec::new());
        };

        DocumentEntity::find()
            .filter(DocumentColumn::Status.eq(DocumentStatus::Published))
            .filter(condition)
            .order_by_desc(DocumentColumn::CreatedAt)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn recent_published(&self, limit: u64) -> Result<Vec<Document>> {
        DocumentEntity::find()
            .filter(DocumentColumn::Status.eq(DocumentStatus::Published))
            .order_by_desc(DocumentColumn::CreatedAt)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Published documents among `ids`, returned in the order of `ids`
    pub async fn find_published_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found = DocumentEntity::find()
            .filter(DocumentColumn::Id.is_in(ids.iter().copied()))
            .filter(DocumentColumn::Status.eq(DocumentStatus::Published))
            .all(self.read_conn())
            .await?;

        let mut by_id: HashMap<Uuid, Document> = found.into_iter().map(|d| (d.id, d)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Review queue, newest first, with each uploader
    pub async fn list_pending(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<(Document, Option<Account>)>, u64)> {
        let paginator = DocumentEntity::find()
            .filter(DocumentColumn::ApprovalStatus.eq(ApprovalStatus::Pending))
            .filter(DocumentColumn::Status.is_in(DocumentStatus::awaiting_review()))
            .order_by_desc(DocumentColumn::CreatedAt)
            .find_also_related(AccountEntity)
            .paginate(self.read_conn(), limit);

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((rows, total))
    }

    pub async fn increment_view_count(&self, id: Uuid) -> Result<bool> {
        self.increment_counter(id, DocumentColumn::ViewCount).await
    }

    pub async fn increment_download_count(&self, id: Uuid) -> Result<bool> {
        self.increment_counter(id, DocumentColumn::DownloadCount).await
    }

    async fn increment_counter(&self, id: Uuid, column: DocumentColumn) -> Result<bool> {
        let result = DocumentEntity::update_many()
            .col_expr(column, Expr::col(column).add(1))
            .filter(DocumentColumn::Id.eq(id))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Apply an admin decision if the document still has the observed
    /// approval status. Returns `false` when another decision got there first.
    pub async fn decide_document(
        &self,
        id: Uuid,
        observed: ApprovalStatus,
        outcome: &DecisionOutcome,
        decided_by: Uuid,
    ) -> Result<bool> {
        let now = Utc::now();

        let changes = DocumentActiveModel {
            status: Set(outcome.state.status),
            approval_status: Set(outcome.state.approval_status),
            approved_by: Set(Some(decided_by)),
            approved_at: Set(Some(now)),
            rejection_reason: Set(outcome.rejection_reason.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = DocumentEntity::update_many()
            .set(changes)
            .filter(DocumentColumn::Id.eq(id))
            .filter(DocumentColumn::ApprovalStatus.eq(observed))
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Record a successful processing hand-off.
    ///
    /// `next` moves the status only if it is still `observed`; the timestamp
    /// and any extracted text are recorded regardless.
    pub async fn record_processing(
        &self,
        id: Uuid,
        observed: DocumentStatus,
        next: Option<DocumentStatus>,
        extracted_text: Option<String>,
    ) -> Result<()> {
        let now = Utc::now();

        if let Some(next) = next {
            DocumentEntity::update_many()
                .col_expr(DocumentColumn::Status, Expr::value(next))
                .filter(DocumentColumn::Id.eq(id))
                .filter(DocumentColumn::Status.eq(observed))
                .exec(self.write_conn())
                .await?;
        }

        let mut update = DocumentEntity::update_many()
            .col_expr(DocumentColumn::ProcessedAt, Expr::value(Some(now)))
            .col_expr(DocumentColumn::UpdatedAt, Expr::value(now));
        if let Some(text) = extracted_text {
            update = update.col_expr(DocumentColumn::ExtractedText, Expr::value(Some(text)));
        }
        update
            .filter(DocumentColumn::Id.eq(id))
            .exec(self.write_conn())
            .await?;

        Ok(())
    }

    pub async fn set_summary(&self, id: Uuid, summary: String) -> Result<()> {
        let document = DocumentActiveModel {
            id: Unchanged(id),
            summary: Set(Some(summary)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        document.update(self.write_conn()).await?;
        Ok(())
    }

    // ========================================================================
    // Verification Operations
    // ========================================================================

    pub async fn find_verification_by_id(&self, id: Uuid) -> Result<Option<VerificationRequest>> {
        VerificationRequestEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// The account's request, read from the primary so guards see the latest state
    pub async fn find_verification_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Option<VerificationRequest>> {
        VerificationRequestEntity::find()
            .filter(VerificationRequestColumn::AccountId.eq(account_id))
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// Create or reactivate the account's request and mark the account pending,
    /// in one transaction.
    pub async fn submit_verification(
        &self,
        account_id: Uuid,
        plan: SubmissionPlan,
        fields: SubmissionFields,
    ) -> Result<VerificationRequest> {
        let now = Utc::now();
        let entry = StatusHistoryEntry {
            status: VerificationStatus::Pending,
            changed_by: Some(account_id),
            changed_at: now,
            notes: None,
        };

        let txn = self.write_conn().begin().await?;

        let request_id = match plan {
            SubmissionPlan::Create => {
                let id = Uuid::new_v4();
                let mut model = submission_changes(fields, now);
                model.id = Set(id);
                model.account_id = Set(account_id);
                model.status_history = Set(StatusHistory::default().appended(entry));
                model.created_at = Set(now);

                model.insert(&txn).await.map_err(|e| {
                    if is_unique_violation(&e) {
                        AppError::conflict("You already have a pending verification request")
                    } else {
                        e.into()
                    }
                })?;
                id
            }
            SubmissionPlan::Reactivate => {
                let existing = VerificationRequestEntity::find()
                    .filter(VerificationRequestColumn::AccountId.eq(account_id))
                    .one(&txn)
                    .await?
                    .ok_or_else(|| AppError::not_found("Verification request", account_id))?;

                let mut model = submission_changes(fields, now);
                model.status_history = Set(existing.status_history.appended(entry));

                let result = VerificationRequestEntity::update_many()
                    .set(model)
                    .filter(VerificationRequestColumn::Id.eq(existing.id))
                    .filter(VerificationRequestColumn::Status.eq(VerificationStatus::Rejected))
                    .exec(&txn)
                    .await?;

                if result.rows_affected != 1 {
                    return Err(AppError::conflict(
                        "Verification request changed while resubmitting",
                    ));
                }
                existing.id
            }
        };

        mirror_on_account(&txn, account_id, request_id, VerificationStatus::Pending, None).await?;

        let request = VerificationRequestEntity::find_by_id(request_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Verification request", request_id))?;

        txn.commit().await?;
        Ok(request)
    }

    /// Move a request from its observed status to `next` and mirror the change
    /// onto the account, in one transaction. Approval also elevates the role
    /// and copies the researcher profile.
    pub async fn transition_verification(
        &self,
        observed: &VerificationRequest,
        next: VerificationStatus,
        action: &ReviewAction,
        reviewer: Uuid,
    ) -> Result<VerificationRequest> {
        let now = Utc::now();
        let entry = StatusHistoryEntry {
            status: next,
            changed_by: Some(reviewer),
            changed_at: now,
            notes: action.notes(),
        };

        let mut changes = VerificationRequestActiveModel {
            status: Set(next),
            reviewed_by: Set(Some(reviewer)),
            reviewed_at: Set(Some(now)),
            status_history: Set(observed.status_history.appended(entry)),
            updated_at: Set(now),
            ..Default::default()
        };
        match action {
            ReviewAction::MarkUnderReview => {}
            ReviewAction::Approve { notes } => changes.review_notes = Set(notes.clone()),
            ReviewAction::Reject { reason } => changes.rejection_reason = Set(Some(reason.clone())),
        }

        let txn = self.write_conn().begin().await?;

        let result = VerificationRequestEntity::update_many()
            .set(changes)
            .filter(VerificationRequestColumn::Id.eq(observed.id))
            .filter(VerificationRequestColumn::Status.eq(observed.status))
            .exec(&txn)
            .await?;

        if result.rows_affected != 1 {
            return Err(AppError::conflict(format!(
                "Verification request is no longer {}",
                observed.status
            )));
        }

        let profile = (next == VerificationStatus::Approved).then_some(observed);
        mirror_on_account(&txn, observed.account_id, observed.id, next, profile).await?;

        let request = VerificationRequestEntity::find_by_id(observed.id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Verification request", observed.id))?;

        txn.commit().await?;
        Ok(request)
    }

    /// Requests filtered by status, newest submission first
    pub async fn list_verifications(
        &self,
        status: Option<VerificationStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<VerificationRequest>, u64)> {
        let mut select = VerificationRequestEntity::find();
        if let Some(status) = status {
            select = select.filter(VerificationRequestColumn::Status.eq(status));
        }

        let paginator = select
            .order_by_desc(VerificationRequestColumn::SubmittedAt)
            .paginate(self.read_conn(), limit);

        let total = paginator.num_items().await?;
        let requests = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((requests, total))
    }

    /// Request count per status; statuses without requests report zero
    pub async fn verification_counts(&self) -> Result<Vec<(VerificationStatus, u64)>> {
        let rows: Vec<(String, i64)> = VerificationRequestEntity::find()
            .select_only()
            .column(VerificationRequestColumn::Status)
            .column_as(Expr::col(VerificationRequestColumn::Id).count(), "count")
            .group_by(VerificationRequestColumn::Status)
            .into_tuple()
            .all(self.read_conn())
            .await?;

        let mut counts: HashMap<VerificationStatus, u64> = HashMap::new();
        for (status, count) in rows {
            let status = VerificationStatus::from_str(&status)?;
            counts.insert(status, u64::try_from(count).unwrap_or_default());
        }

        Ok(VerificationStatus::ALL
            .into_iter()
            .map(|s| (s, counts.get(&s).copied().unwrap_or(0)))
            .collect())
    }
    // ========================================================================
    // Author Operations
    // ========================================================================

    /// Insert an author unless one with the same name (ignoring case)
    /// exists. Returns the entry and whether it was created.
    pub async fn create_or_get_author(&self, new: NewAuthor) -> Result<(Author, bool)> {
        let name_key = new.name.to_lowercase();
        if let Some(existing) = self.find_author_by_key(&name_key).await? {
            return Ok((existing, false));
        }

        let now = Utc::now();
        let author = AuthorActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(new.name),
            name_key: Set(name_key.clone()),
            email: Set(new.email),
            affiliation: Set(new.affiliation),
            bio: Set(new.bio),
            profile_image: Set(None),
            research_interests: Set(new.research_interests),
            citation_count: Set(0),
            h_index: Set(0),
            orcid: Set(None),
            google_scholar_id: Set(None),
            website: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match author.insert(self.write_conn()).await {
            Ok(created) => Ok((created, true)),
            // Lost a race with an identical create
            Err(e) if is_unique_violation(&e) => self
                .find_author_by_key(&name_key)
                .await?
                .map(|existing| (existing, false))
                .ok_or_else(|| AppError::conflict("Author was created concurrently")),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_author_by_key(&self, name_key: &str) -> Result<Option<Author>> {
        AuthorEntity::find()
            .filter(AuthorColumn::NameKey.eq(name_key))
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn find_author_by_id(&self, id: Uuid) -> Result<Option<Author>> {
        AuthorEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    pub async fn list_authors(
        &self,
        query: &AuthorQuery,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<Author>, u64)> {
        let mut select = AuthorEntity::find();

        if let Some(search) = query.search.as_deref() {
            if let Some(condition) = author_condition(search) {
                select = select.filter(condition);
            }
        }

        select = match query.sort {
            AuthorSort::Citations => select.order_by_desc(AuthorColumn::CitationCount),
            AuthorSort::HIndex => select.order_by_desc(AuthorColumn::HIndex),
            AuthorSort::Name => select.order_by_asc(AuthorColumn::NameKey),
        };

        let paginator = select
            .order_by_asc(AuthorColumn::CreatedAt)
            .paginate(self.read_conn(), limit);

        let total = paginator.num_items().await?;
        let authors = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((authors, total))
    }

    /// Most cited first, h-index breaking ties
    pub async fn top_authors(&self, limit: u64) -> Result<Vec<Author>> {
        AuthorEntity::find()
            .order_by_desc(AuthorColumn::CitationCount)
            .order_by_desc(AuthorColumn::HIndex)
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Published documents whose author field names this author, newest first
    pub async fn publications_of(&self, name: &str) -> Result<Vec<Document>> {
        let name_key = name.trim().to_lowercase();
        DocumentEntity::find()
            .filter(DocumentColumn::Status.eq(DocumentStatus::Published))
            .filter(Expr::expr(Func::lower(Expr::col(DocumentColumn::Author))).eq(name_key))
            .order_by_desc(DocumentColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }
}

/// Field values written on submit and resubmit; prior decision fields cleared
fn submission_changes(fields: SubmissionFields, now: DateTime<Utc>) -> VerificationRequestActiveModel {
    VerificationRequestActiveModel {
        full_name: Set(fields.full_name),
        date_of_birth: Set(fields.date_of_birth),
        id_type: Set(fields.id_type),
        id_number: Set(fields.id_number),
        institution: Set(fields.institution),
        department: Set(fields.department),
        position: Set(fields.position),
        research_areas: Set(fields.research_areas),
        orcid_id: Set(fields.orcid_id),
        google_scholar_id: Set(fields.google_scholar_id),
        linkedin_profile: Set(fields.linkedin_profile),
        personal_website: Set(fields.personal_website),
        id_document_url: Set(fields.id_document_url),
        profile_photo_url: Set(fields.profile_photo_url),
        status: Set(VerificationStatus::Pending),
        submitted_at: Set(now),
        reviewed_by: Set(None),
        reviewed_at: Set(None),
        review_notes: Set(None),
        rejection_reason: Set(None),
        updated_at: Set(now),
        ..Default::default()
    }
}

async fn mirror_on_account(
    txn: &DatabaseTransaction,
    account_id: Uuid,
    request_id: Uuid,
    status: VerificationStatus,
    approved: Option<&VerificationRequest>,
) -> Result<()> {
    let mut changes = AccountActiveModel {
        verification_status: Set(AccountVerificationStatus::from(status)),
        verification_request_id: Set(Some(request_id)),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };

    if let Some(request) = approved {
        changes.role = Set(Role::Researcher);
        changes.institution = Set(Some(request.institution.clone()));
        changes.department = Set(request.department.clone());
        changes.position = Set(request.position.map(|p| p.as_str().to_string()));
        changes.orcid_id = Set(request.orcid_id.clone());
        changes.google_scholar_id = Set(request.google_scholar_id.clone());
        changes.linkedin_profile = Set(request.linkedin_profile.clone());
        changes.profile_photo = Set(Some(request.profile_photo_url.clone()));
        changes.research_areas = Set(request.research_areas.clone());
    }

    let result = AccountEntity::update_many()
        .set(changes)
        .filter(AccountColumn::Id.eq(account_id))
        .exec(txn)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::not_found("Account", account_id));
    }
    Ok(())
}

/// Case-insensitive match of any search term against title, description or
/// extracted text
fn keyword_condition(text: &str) -> Option<Condition> {
    let terms = search_terms(text);
    if terms.is_empty() {
        return None;
    }

    let mut condition = Condition::any();
    for term in terms {
        let pattern = format!("%{}%", term);
        for column in [
            DocumentColumn::Title,
            DocumentColumn::Description,
            DocumentColumn::ExtractedText,
        ] {
            condition = condition.add(Expr::expr(Func::lower(Expr::col(column))).like(pattern.clone()));
        }
    }
    Some(condition)
}

/// Author directory match on name, affiliation or research interests
fn author_condition(text: &str) -> Option<Condition> {
    let terms = search_terms(text);
    if terms.is_empty() {
        return None;
    }

    let mut condition = Condition::any();
    for term in terms {
        let pattern = format!("%{}%", term);
        for column in [AuthorColumn::Name, AuthorColumn::Affiliation] {
            condition = condition.add(Expr::expr(Func::lower(Expr::col(column))).like(pattern.clone()));
        }
        let interests = Expr::col(AuthorColumn::ResearchInterests).cast_as(Alias::new("text"));
        condition = condition.add(Expr::expr(Func::lower(interests)).like(pattern));
    }
    Some(condition)
}

/// Lower-cased whitespace separated terms with LIKE wildcards stripped
fn search_terms(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.to_lowercase().replace(['%', '_'], ""))
        .filter(|t| !t.is_empty())
        .collect()
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::lifecycle::document::{decide, initial_state, DocumentDecision};

    async fn repo() -> Repository {
        let pool = DbPool::new(&DatabaseConfig::in_memory()).await.unwrap();
        pool.migrate().await.unwrap();
        Repository::new(pool)
    }

    async fn account(repo: &Repository, email: &str, role: Role) -> Account {
        repo.create_account(NewAccount {
            name: "Test".into(),
            email: email.into(),
            password_hash: "hash".into(),
            role,
            email_verified: false,
        })
        .await
        .unwrap()
    }

    fn new_document(title: &str, uploader: &Account) -> NewDocument {
        NewDocument {
            title: title.into(),
            description: Some("A study of graph neural networks".into()),
            author: None,
            category: Some("cs".into()),
            tags: StringList::from_csv("ml"),
            file_url: "/uploads/x.pdf".into(),
            file_name: "x.pdf".into(),
            file_size: 10,
            mime_type: "application/pdf".into(),
            metadata: DocumentMetadata::default(),
            state: initial_state(uploader.role),
            uploaded_by: uploader.id,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let repo = repo().await;
        account(&repo, "a@x.org", Role::Student).await;
        let err = repo
            .create_account(NewAccount {
                name: "Other".into(),
                email: "a@x.org".into(),
                password_hash: "h".into(),
                role: Role::Student,
                email_verified: false,
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_decision_is_compare_and_swap() {
        let repo = repo().await;
        let student = account(&repo, "s@x.org", Role::Student).await;
        let admin = account(&repo, "admin@x.org", Role::Admin).await;
        let doc = repo.create_document(new_document("Doc", &student)).await.unwrap();

        let outcome = decide(doc.approval_status, &DocumentDecision::Approve).unwrap();
        assert!(repo
            .decide_document(doc.id, doc.approval_status, &outcome, admin.id)
            .await
            .unwrap());
        // Same observed state again: the row no longer matches
        assert!(!repo
            .decide_document(doc.id, doc.approval_status, &outcome, admin.id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_keyword_search_is_case_insensitive() {
        let repo = repo().await;
        let admin = account(&repo, "admin@x.org", Role::Admin).await;
        repo.create_document(new_document("Deep Learning Survey", &admin))
            .await
            .unwrap();

        assert_eq!(repo.keyword_search("deep", 20).await.unwrap().len(), 1);
        assert_eq!(repo.keyword_search("GRAPH", 20).await.unwrap().len(), 1);
        assert!(repo.keyword_search("chemistry", 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_published_by_ids_keeps_rank_order() {
        let repo = repo().await;
        let admin = account(&repo, "admin@x.org", Role::Admin).await;
        let student = account(&repo, "s@x.org", Role::Student).await;
        let a = repo.create_document(new_document("A", &admin)).await.unwrap();
        let b = repo.create_document(new_document("B", &admin)).await.unwrap();
        let queued = repo.create_document(new_document("C", &student)).await.unwrap();

        let found = repo
            .find_published_by_ids(&[b.id, queued.id, a.id])
            .await
            .unwrap();
        let ids: Vec<Uuid> = found.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_counters_increment() {
        let repo = repo().await;
        let admin = account(&repo, "admin@x.org", Role::Admin).await;
        let doc = repo.create_document(new_document("A", &admin)).await.unwrap();

        repo.increment_view_count(doc.id).await.unwrap();
        repo.increment_view_count(doc.id).await.unwrap();
        repo.increment_download_count(doc.id).await.unwrap();
        assert!(!repo.increment_view_count(Uuid::new_v4()).await.unwrap());

        let doc = repo.find_document_by_id(doc.id).await.unwrap().unwrap();
        assert_eq!(doc.view_count, 2);
        assert_eq!(doc.download_count, 1);
    }

    #[tokio::test]
    async fn test_verification_counts_are_zero_filled() {
        let repo = repo().await;
        let counts = repo.verification_counts().await.unwrap();
        assert_eq!(counts.len(), 4);
        assert!(counts.iter().all(|(_, n)| *n == 0));
    }

    fn new_author(name: &str, interests: &str) -> NewAuthor {
        NewAuthor {
            name: name.into(),
            email: None,
            affiliation: Some("Institute of Computing".into()),
            bio: None,
            research_interests: StringList::from_csv(interests),
        }
    }

    async fn set_metrics(repo: &Repository, author: &Author, citations: i64, h_index: i64) {
        AuthorActiveModel {
            id: Unchanged(author.id),
            citation_count: Set(citations),
            h_index: Set(h_index),
            ..Default::default()
        }
        .update(repo.write_conn())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_author_create_ignores_name_case() {
        let repo = repo().await;
        let (first, created) = repo
            .create_or_get_author(new_author("Ada Lovelace", "computing"))
            .await
            .unwrap();
        assert!(created);

        let (again, created) = repo
            .create_or_get_author(new_author("ADA LOVELACE", "poetry"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(again.id, first.id);
        assert_eq!(again.name, "Ada Lovelace");
        assert_eq!(again.research_interests.as_slice(), ["computing"]);
    }

    #[tokio::test]
    async fn test_author_listing_sorts_and_searches() {
        let repo = repo().await;
        let (grace, _) = repo.create_or_get_author(new_author("Grace Hopper", "compilers")).await.unwrap();
        let (alan, _) = repo.create_or_get_author(new_author("Alan Turing", "Computability")).await.unwrap();
        let (edsger, _) = repo.create_or_get_author(new_author("Edsger Dijkstra", "graphs")).await.unwrap();
        set_metrics(&repo, &grace, 50, 9).await;
        set_metrics(&repo, &alan, 50, 12).await;
        set_metrics(&repo, &edsger, 80, 3).await;

        let names = |authors: Vec<Author>| authors.into_iter().map(|a| a.name).collect::<Vec<_>>();

        let top = repo.top_authors(10).await.unwrap();
        assert_eq!(names(top), ["Edsger Dijkstra", "Alan Turing", "Grace Hopper"]);

        let by_name = AuthorQuery { search: None, sort: AuthorSort::Name };
        let (authors, total) = repo.list_authors(&by_name, 1, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(names(authors), ["Alan Turing", "Edsger Dijkstra"]);

        let by_h = AuthorQuery { search: None, sort: AuthorSort::HIndex };
        let (authors, _) = repo.list_authors(&by_h, 1, 1).await.unwrap();
        assert_eq!(names(authors), ["Alan Turing"]);

        let search = AuthorQuery { search: Some("COMPUT".into()), sort: AuthorSort::Citations };
        let (authors, total) = repo.list_authors(&search, 1, 10).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(authors[0].name, "Edsger Dijkstra");

        let search = AuthorQuery { search: Some("compilers".into()), sort: AuthorSort::Citations };
        let (authors, _) = repo.list_authors(&search, 1, 10).await.unwrap();
        assert_eq!(names(authors), ["Grace Hopper"]);
    }

    #[tokio::test]
    async fn test_publications_are_published_documents_by_name() {
        let repo = repo().await;
        let admin = account(&repo, "admin@x.org", Role::Admin).await;
        let student = account(&repo, "s@x.org", Role::Student).await;

        let mut published = new_document("Notes on the Analytical Engine", &admin);
        published.author = Some("ada lovelace".into());
        let published = repo.create_document(published).await.unwrap();

        let mut queued = new_document("Unreviewed draft", &student);
        queued.author = Some("Ada Lovelace".into());
        repo.create_document(queued).await.unwrap();

        let mut other = new_document("Elsewhere", &admin);
        other.author = Some("Charles Babbage".into());
        repo.create_document(other).await.unwrap();

        let found = repo.publications_of("Ada Lovelace").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, published.id);
    }

    #[test]
    fn test_author_sort_parsing() {
        assert_eq!("".parse::<AuthorSort>().unwrap(), AuthorSort::Citations);
        assert_eq!("citationCount".parse::<AuthorSort>().unwrap(), AuthorSort::Citations);
        assert_eq!("hIndex".parse::<AuthorSort>().unwrap(), AuthorSort::HIndex);
        assert_eq!("name".parse::<AuthorSort>().unwrap(), AuthorSort::Name);
        assert!("popularity".parse::<AuthorSort>().is_err());
    }
}
