//! Macros for ergonomic machine construction.

/// Generate `StateId` and `EventId` implementations for a plain enum.
///
/// The enum gets the derives the runtime expects from an id type, and
/// `name()` returns the variant name.
///
/// # Example
///
/// ```
/// use treeline::core::{EventId, StateId};
/// use treeline::id_enum;
///
/// id_enum! {
///     pub enum Gate {
///         Open,
///         Closed,
///     }
/// }
///
/// assert_eq!(StateId::name(&Gate::Closed), "Closed");
/// assert_eq!(EventId::name(&Gate::Open), "Open");
/// ```
#[macro_export]
macro_rules! id_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize,
        )]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::StateId for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }
        }

        impl $crate::core::EventId for $name {
            fn name(&self) -> &str {
                $crate::core::StateId::name(self)
            }
        }
    };
}
