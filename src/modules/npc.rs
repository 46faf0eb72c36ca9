use dnd_schema_kernel::{CollectionSpec, IndexSpec, Module};

pub const USER_NPCS: &str = "user_npcs";
pub const USER_NPC_NOTES: &str = "user_npc_notes";

/// Generated NPCs saved by users and the notes attached to them
pub struct NpcModule;

impl NpcModule {
    pub const fn new() -> Self {
        Self
    }
}

impl Module for NpcModule {
    fn name(&self) -> &'static str {
        "npc"
    }

    fn collections(&self) -> Vec<CollectionSpec> {
        vec![
            CollectionSpec::new(USER_NPCS)
                .with_index(IndexSpec::new().ascending("name").ascending("user").unique())
                // name search across NPCs
                .with_index(IndexSpec::new().text("name")),
            CollectionSpec::new(USER_NPC_NOTES),
        ]
    }
}
