use crate::schema::CollectionSpec;

/// A domain area of the bot that owns a slice of the database schema
pub trait Module: Sync + Send {
    /// Unique name for this module
    fn name(&self) -> &'static str;

    /// Collections owned by this module, with their indexes
    /// Collections are created in the order returned
    fn collections(&self) -> Vec<CollectionSpec> {
        vec![]
    }
}
