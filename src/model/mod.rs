pub mod approval;
pub mod attendance;
pub mod department;
pub mod leave_request;
pub mod notification;
pub mod office_location;
pub mod permission_request;
pub mod role;
pub mod user;
pub mod work_letter;
