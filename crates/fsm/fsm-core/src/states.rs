//! Named state groups.

/// Declares a unit struct whose associated constants are fully qualified state names of the form
/// `StatesGroup_<Group>_State_<item>`.
///
/// ```rust
/// fsm_core::states_group!(pub Registration { waiting_name, waiting_age });
///
/// assert_eq!(Registration::waiting_name, "StatesGroup_Registration_State_waiting_name");
/// assert!(Registration::contains("StatesGroup_Registration_State_waiting_age"));
/// assert_eq!(Registration::ALL.len(), 2);
/// ```
#[macro_export]
macro_rules! states_group {
    ($vis:vis $group:ident { $($item:ident),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis struct $group;

        #[allow(non_upper_case_globals, dead_code)]
        impl $group {
            $(
                pub const $item: &'static str =
                    concat!("StatesGroup_", stringify!($group), "_State_", stringify!($item));
            )+

            /// Every state of the group, in declaration order.
            pub const ALL: &'static [&'static str] = &[$(Self::$item),+];

            /// Whether `state` belongs to this group.
            pub fn contains(state: &str) -> bool {
                Self::ALL.contains(&state)
            }
        }
    };
}
