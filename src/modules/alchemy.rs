use dnd_schema_kernel::{CollectionSpec, IndexSpec, Module};

pub const USER_POTIONS: &str = "user_potions";
pub const USER_INFO: &str = "user_info";

/// Potions brewed and saved by users, plus per-user profile data (coins and the like)
pub struct AlchemyModule;

impl AlchemyModule {
    pub const fn new() -> Self {
        Self
    }
}

impl Module for AlchemyModule {
    fn name(&self) -> &'static str {
        "alchemy"
    }

    fn collections(&self) -> Vec<CollectionSpec> {
        vec![
            // A user cannot save two potions under the same name.
            CollectionSpec::new(USER_POTIONS)
                .with_index(IndexSpec::new().ascending("name").ascending("user").unique()),
            CollectionSpec::new(USER_INFO),
        ]
    }
}
