pub mod admin;
pub mod approval;
pub mod attendance;
pub mod dashboard;
pub mod leave_request;
pub mod notification;
pub mod office_location;
pub mod permission_request;
pub mod work_letter;

use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::{ApiError, ApiResult};
use crate::model::approval::RequestStatus;
use crate::utils::db_utils::{PageQuery, WhereBuilder};

/// Filter shared by the "my requests" lists.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RequestListQuery {
    /// PENDING, APPROVED, REJECTED or CANCELLED
    pub status: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl RequestListQuery {
    pub fn page(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            per_page: self.per_page,
        }
    }

    /// Owner filter plus the optional status filter.
    pub fn filter(&self, user_id: u64) -> ApiResult<WhereBuilder> {
        let mut filter = WhereBuilder::new();
        filter.push("user_id = ?", user_id);
        if let Some(raw) = &self.status {
            let status = raw
                .parse::<RequestStatus>()
                .map_err(|_| ApiError::bad_request(format!("Status pengajuan tidak dikenal: {raw}")))?;
            filter.push("status = ?", status.as_ref());
        }
        Ok(filter)
    }
}
