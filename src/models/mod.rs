// Declare modules
pub mod call;
pub mod listing;
pub mod meeting;
pub mod sync;
pub mod user;

// Flattened re-exports so callers can `use crate::models::Meeting`.
pub use call::{CallSpec, CallState, Recording};
pub use listing::{
    ListingParams, MeetingFilter, MeetingListing, PageRequest, Pagination, SortOrder, DEFAULT_PAGE_SIZE,
    MAX_PAGE, MAX_PAGE_SIZE,
};
pub use meeting::{
    ComputedFields, CreateMeetingRequest, InviteRequest, Meeting, MeetingPatch, MeetingRow, MeetingStatus,
    MeetingMembers, MeetingView, NewMeeting, Participant, MAX_DURATION_MINUTES,
};
pub use sync::{BatchOutcome, SyncMeta};
pub use user::{User, UserProfile};
