use dnd_schema_kernel::{CollectionSpec, Module};

pub const GAMES: &str = "games";

pub struct CasinoModule;

impl CasinoModule {
    pub const fn new() -> Self {
        Self
    }
}

impl Module for CasinoModule {
    fn name(&self) -> &'static str {
        "casino"
    }

    fn collections(&self) -> Vec<CollectionSpec> {
        vec![CollectionSpec::new(GAMES)]
    }
}
