/// A stable name for a command, event or snapshot type.
///
/// The name is what gets persisted, so renaming a Rust type must not change
/// it. Implement by hand or through [`named!`](crate::named).
pub trait Named {
    const NAME: &'static str;
}

/// Implements [`Named`] for one or more types.
///
/// ```ignore
/// named!(Created, MealSelected);
/// named!(Canceled => "restaurant.canceled");
/// ```
#[macro_export]
macro_rules! named {
    ($($ty:ident => $name:expr),+ $(,)?) => {
        $(
            impl $crate::registry::Named for $ty {
                const NAME: &'static str = $name;
            }
        )+
    };
    ($($ty:ident),+ $(,)?) => {
        $(
            impl $crate::registry::Named for $ty {
                const NAME: &'static str = stringify!($ty);
            }
        )+
    };
}
