use crate::api::admin::departments::CreateDepartment;
use crate::api::admin::office_locations::CreateOfficeLocation;
use crate::api::admin::roles::CreateRole;
use crate::api::admin::users::{CreateUser, ResetPassword};
use crate::api::admin::workflows::{ReplaceWorkflow, WorkflowConfig};
use crate::api::approval::DecisionReq;
use crate::api::attendance::{AttendanceEntry, AttendanceResponse, CloseDayReq, LocationReq};
use crate::api::dashboard::{Dashboard, OfficeSummary};
use crate::api::leave_request::CreateLeave;
use crate::api::permission_request::CreatePermission;
use crate::api::work_letter::CreateWorkLetter;
use crate::auth::handlers::ChangePasswordReq;
use crate::model::approval::{Approval, Decision, RequestKind, RequestStatus};
use crate::model::attendance::{Attendance, AttendanceStatus};
use crate::model::department::Department;
use crate::model::leave_request::{LeaveRequest, LeaveType};
use crate::model::notification::Notification;
use crate::model::office_location::OfficeLocation;
use crate::model::permission_request::{PermissionRequest, PermissionType};
use crate::model::role::Role;
use crate::model::user::User;
use crate::model::work_letter::WorkLetter;
use crate::models::{LoginReqDto, LoginResponse};
use crate::utils::db_utils::{
    PaginatedAttendance, PaginatedAttendanceEntry, PaginatedLeave, PaginatedNotification,
    PaginatedPermission, PaginatedUser, PaginatedWorkLetter,
};
use crate::utils::geo::{Coordinate, GeofenceMatch};
use crate::workflow::engine::ApprovalStep;
use crate::workflow::store::{ApprovalHistory, DecisionOutcome, PendingItem};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Absensi API",
        version = "1.0.0",
        description = r#"
## Portal Absensi dan Kepegawaian

Backend for a government office attendance and HR portal. Staff are identified by **NIP**.

### Key Features
- **Attendance**
  - GPS check-in and check-out inside an office geofence, late detection, daily history
- **Requests**
  - Leave (cuti), permission (izin) and work letters (surat tugas)
- **Approvals**
  - Configurable multi-level approval routes per request type
- **Notifications**
  - Stored notifications plus a live Server-Sent Events stream
- **Administration**
  - Users, departments, roles, office locations and approval routes

### Security
All `/api` endpoints require a **JWT Bearer** access token. `/api/admin/*` is restricted to the `ADMIN` role.
The notification stream also accepts the token as `?token=` for EventSource clients.

### Response Format
- JSON bodies; errors are `{ "error": "..." }` with Indonesian messages
- List endpoints are paginated with `page` and `per_page`
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,
        crate::auth::handlers::change_password,

        crate::api::dashboard::dashboard,

        crate::api::office_location::list_active,
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::history,

        crate::api::leave_request::create_leave,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::cancel_leave,

        crate::api::permission_request::create_permission,
        crate::api::permission_request::permission_list,
        crate::api::permission_request::get_permission,
        crate::api::permission_request::cancel_permission,

        crate::api::work_letter::create_work_letter,
        crate::api::work_letter::work_letter_list,
        crate::api::work_letter::get_work_letter,
        crate::api::work_letter::cancel_work_letter,

        crate::api::approval::pending,
        crate::api::approval::approve,
        crate::api::approval::reject,
        crate::api::approval::history,

        crate::api::notification::list,
        crate::api::notification::unread_count,
        crate::api::notification::mark_read,
        crate::api::notification::mark_all_read,
        crate::api::notification::stream,

        crate::api::attendance::admin_list,
        crate::api::attendance::close_day_handler,
        crate::api::admin::users::list_users,
        crate::api::admin::users::create_user,
        crate::api::admin::users::get_user,
        crate::api::admin::users::update_user,
        crate::api::admin::users::deactivate_user,
        crate::api::admin::users::reset_password,
        crate::api::admin::departments::list_departments,
        crate::api::admin::departments::create_department,
        crate::api::admin::departments::update_department,
        crate::api::admin::departments::delete_department,
        crate::api::admin::roles::list_roles,
        crate::api::admin::roles::create_role,
        crate::api::admin::roles::update_role,
        crate::api::admin::roles::delete_role,
        crate::api::admin::office_locations::list_offices,
        crate::api::admin::office_locations::create_office,
        crate::api::admin::office_locations::update_office,
        crate::api::admin::office_locations::delete_office,
        crate::api::admin::workflows::list_workflows,
        crate::api::admin::workflows::replace_workflow
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            ChangePasswordReq,
            User,
            Role,
            Department,
            OfficeLocation,
            Coordinate,
            GeofenceMatch,
            Attendance,
            AttendanceStatus,
            AttendanceEntry,
            AttendanceResponse,
            LocationReq,
            CloseDayReq,
            LeaveRequest,
            LeaveType,
            CreateLeave,
            PermissionRequest,
            PermissionType,
            CreatePermission,
            WorkLetter,
            CreateWorkLetter,
            RequestKind,
            RequestStatus,
            Decision,
            Approval,
            ApprovalStep,
            ApprovalHistory,
            DecisionReq,
            DecisionOutcome,
            PendingItem,
            Notification,
            Dashboard,
            OfficeSummary,
            CreateUser,
            ResetPassword,
            CreateDepartment,
            CreateRole,
            CreateOfficeLocation,
            WorkflowConfig,
            ReplaceWorkflow,
            PaginatedAttendance,
            PaginatedAttendanceEntry,
            PaginatedLeave,
            PaginatedPermission,
            PaginatedWorkLetter,
            PaginatedNotification,
            PaginatedUser
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token refresh and own account"),
        (name = "Dashboard", description = "Home screen figures"),
        (name = "Attendance", description = "Check-in, check-out and attendance history"),
        (name = "Leave", description = "Leave (cuti) requests"),
        (name = "Permission", description = "Permission (izin) requests"),
        (name = "Work Letter", description = "Work letter (surat tugas) requests"),
        (name = "Approval", description = "Approval inbox and decisions"),
        (name = "Notification", description = "Stored notifications and live stream"),
        (name = "Admin", description = "Administration, ADMIN role only"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
