// id.rs — Dense identifiers for HLIR entities.
//
// Every HLIR arena is a `Vec` indexed by one of these newtypes. Ids are
// allocated in declaration (source) order during HLIR construction, which
// makes iteration order — and everything derived from it — deterministic.

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(
    /// Index of a header type declaration.
    HeaderTypeId
);
define_id!(
    /// Index of a header or metadata instance.
    InstanceId
);
define_id!(
    /// Index of a field within the global field arena. Each instance's
    /// fields (including its synthesized validity field) are contiguous.
    FieldId
);
define_id!(
    /// Index of an action declaration.
    ActionId
);
define_id!(
    /// Index of a match-action table.
    TableId
);
define_id!(
    /// Index of a conditional node extracted from a control block.
    CondId
);
define_id!(
    /// Index of a control-flow node (table or conditional occurrence).
    CfNodeId
);
define_id!(
    /// Index of a schedulable event in the dependency graph arena.
    EventId
);
