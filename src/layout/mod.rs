pub mod bounds;
pub mod overlap;

pub use self::bounds::{
    Dimensions, EMPTY_GROUP_BOUNDS, LiveLayout, Rect, apply_group_bounds, compute_group_bounds,
    group_members,
};
pub use self::overlap::{LayoutOptions, layout_with_groups};
