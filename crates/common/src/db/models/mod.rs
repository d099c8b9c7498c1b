//! SeaORM entity models

mod account;
mod author;
mod document;
mod values;
mod verification_request;

pub use account::{
    ActiveModel as AccountActiveModel, Column as AccountColumn, Entity as AccountEntity,
    Model as Account,
};

pub use author::{
    ActiveModel as AuthorActiveModel, Column as AuthorColumn, Entity as AuthorEntity,
    Model as Author,
};

pub use document::{
    ActiveModel as DocumentActiveModel, Column as DocumentColumn, Entity as DocumentEntity,
    Model as Document,
};

pub use verification_request::{
    ActiveModel as VerificationRequestActiveModel, Column as VerificationRequestColumn,
    Entity as VerificationRequestEntity, Model as VerificationRequest,
};

pub use values::{
    DocumentMetadata, LoginEntry, LoginHistory, SearchEntry, SearchHistory, StringList,
    LOGIN_HISTORY_LIMIT, SEARCH_HISTORY_LIMIT,
};
