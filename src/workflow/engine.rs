use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::model::approval::{Decision, RequestStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ApprovalStep {
    #[schema(example = "SUPERVISOR")]
    pub role_code: String,
    /// Approver must belong to the requester's department.
    #[serde(default)]
    pub same_department: bool,
}

/// Ordered list of approver roles a request walks through. Snapshotted onto
/// each request at submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRoute {
    steps: Vec<ApprovalStep>,
}

/// Where a request stands right now.
#[derive(Debug, Clone)]
pub struct RequestState {
    pub status: RequestStatus,
    pub current_step: usize,
    pub requester_id: u64,
    pub requester_department: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct Approver<'a> {
    pub user_id: u64,
    pub role_code: &'a str,
    pub department_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Advanced { next_step: usize },
    Approved,
    Rejected,
}

impl Transition {
    pub fn status(self) -> RequestStatus {
        match self {
            Self::Advanced { .. } => RequestStatus::Pending,
            Self::Approved => RequestStatus::Approved,
            Self::Rejected => RequestStatus::Rejected,
        }
    }

    pub fn step_after(self, current: usize) -> usize {
        match self {
            Self::Advanced { next_step } => next_step,
            _ => current,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Alur persetujuan belum dikonfigurasi")]
    EmptyRoute,
    #[error("Pengajuan sudah berstatus {0}")]
    AlreadyFinal(RequestStatus),
    #[error("Tahap persetujuan {0} tidak ada dalam alur")]
    StepOutOfRange(usize),
    #[error("Tahap ini harus disetujui oleh {required}")]
    WrongRole { required: String },
    #[error("Tahap ini hanya dapat diputuskan oleh atasan dalam bidang yang sama")]
    OutsideDepartment,
    #[error("Anda tidak dapat memutuskan pengajuan sendiri")]
    OwnRequest,
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::EmptyRoute => ApiError::Unprocessable(err.to_string()),
            WorkflowError::AlreadyFinal(_) => ApiError::Conflict(err.to_string()),
            WorkflowError::StepOutOfRange(_) => ApiError::Internal(anyhow::anyhow!(err)),
            WorkflowError::WrongRole { .. }
            | WorkflowError::OutsideDepartment
            | WorkflowError::OwnRequest => ApiError::Forbidden(err.to_string()),
        }
    }
}

impl ApprovalRoute {
    pub fn new(steps: Vec<ApprovalStep>) -> Result<Self, WorkflowError> {
        if steps.is_empty() {
            return Err(WorkflowError::EmptyRoute);
        }
        Ok(Self { steps })
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let steps: Vec<ApprovalStep> = serde_json::from_str(raw)?;
        Ok(Self::new(steps)?)
    }

    pub fn to_json(&self) -> String {
        // Vec of plain structs; serialization cannot fail.
        serde_json::to_string(&self.steps).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn steps(&self) -> &[ApprovalStep] {
        &self.steps
    }

    pub fn first(&self) -> &ApprovalStep {
        &self.steps[0]
    }

    pub fn step(&self, index: usize) -> Option<&ApprovalStep> {
        self.steps.get(index)
    }

    /// Step still waiting for a decision, if any.
    pub fn pending_step(&self, state: &RequestState) -> Option<&ApprovalStep> {
        if state.status == RequestStatus::Pending {
            self.step(state.current_step)
        } else {
            None
        }
    }

    pub fn involves_role(&self, role_code: &str) -> bool {
        self.steps.iter().any(|s| s.role_code == role_code)
    }

    /// Validates that `approver` may decide the current step and computes the
    /// resulting transition. Rejection at any step is final; approval of the
    /// last step finalizes the request.
    pub fn decide(
        &self,
        state: &RequestState,
        approver: &Approver<'_>,
        decision: Decision,
    ) -> Result<Transition, WorkflowError> {
        if state.status.is_final() {
            return Err(WorkflowError::AlreadyFinal(state.status));
        }

        let step = self
            .step(state.current_step)
            .ok_or(WorkflowError::StepOutOfRange(state.current_step))?;

        if approver.user_id == state.requester_id {
            return Err(WorkflowError::OwnRequest);
        }

        if approver.role_code != step.role_code {
            return Err(WorkflowError::WrongRole {
                required: step.role_code.clone(),
            });
        }

        // Requesters without a department can be decided by any holder of the role.
        if step.same_department {
            if let Some(dept) = state.requester_department {
                if approver.department_id != Some(dept) {
                    return Err(WorkflowError::OutsideDepartment);
                }
            }
        }

        Ok(match decision {
            Decision::Rejected => Transition::Rejected,
            Decision::Approved if state.current_step + 1 >= self.steps.len() => {
                Transition::Approved
            }
            Decision::Approved => Transition::Advanced {
                next_step: state.current_step + 1,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(role: &str, same_department: bool) -> ApprovalStep {
        ApprovalStep {
            role_code: role.into(),
            same_department,
        }
    }

    fn leave_route() -> ApprovalRoute {
        ApprovalRoute::new(vec![
            step("SUPERVISOR", true),
            step("SECRETARY", false),
            step("HEAD", false),
        ])
        .unwrap()
    }

    fn pending(current_step: usize) -> RequestState {
        RequestState {
            status: RequestStatus::Pending,
            current_step,
            requester_id: 10,
            requester_department: Some(2),
        }
    }

    fn approver(role: &str, department_id: Option<u64>) -> Approver<'_> {
        Approver {
            user_id: 20,
            role_code: role,
            department_id,
        }
    }

    #[test]
    fn empty_route_is_refused() {
        assert_eq!(ApprovalRoute::new(vec![]), Err(WorkflowError::EmptyRoute));
    }

    #[test]
    fn walks_steps_in_order() {
        let route = leave_route();

        let t = route
            .decide(&pending(0), &approver("SUPERVISOR", Some(2)), Decision::Approved)
            .unwrap();
        assert_eq!(t, Transition::Advanced { next_step: 1 });
        assert_eq!(t.status(), RequestStatus::Pending);

        let t = route
            .decide(&pending(1), &approver("SECRETARY", Some(9)), Decision::Approved)
            .unwrap();
        assert_eq!(t, Transition::Advanced { next_step: 2 });

        let t = route
            .decide(&pending(2), &approver("HEAD", None), Decision::Approved)
            .unwrap();
        assert_eq!(t, Transition::Approved);
        assert_eq!(t.step_after(2), 2);
    }

    #[test]
    fn rejection_is_final_at_any_step() {
        let route = leave_route();
        let t = route
            .decide(&pending(1), &approver("SECRETARY", None), Decision::Rejected)
            .unwrap();
        assert_eq!(t, Transition::Rejected);
        assert_eq!(t.status(), RequestStatus::Rejected);
    }

    #[test]
    fn wrong_role_cannot_skip_ahead() {
        let err = leave_route()
            .decide(&pending(0), &approver("HEAD", Some(2)), Decision::Approved)
            .unwrap_err();
        assert_eq!(
            err,
            WorkflowError::WrongRole {
                required: "SUPERVISOR".into()
            }
        );
    }

    #[test]
    fn department_scoped_step_checks_department() {
        let route = leave_route();
        assert_eq!(
            route
                .decide(&pending(0), &approver("SUPERVISOR", Some(3)), Decision::Approved)
                .unwrap_err(),
            WorkflowError::OutsideDepartment
        );

        let mut no_dept = pending(0);
        no_dept.requester_department = None;
        assert!(route
            .decide(&no_dept, &approver("SUPERVISOR", Some(3)), Decision::Approved)
            .is_ok());
    }

    #[test]
    fn finalized_requests_are_locked() {
        let mut state = pending(2);
        state.status = RequestStatus::Approved;
        assert_eq!(
            leave_route()
                .decide(&state, &approver("HEAD", None), Decision::Rejected)
                .unwrap_err(),
            WorkflowError::AlreadyFinal(RequestStatus::Approved)
        );
    }

    #[test]
    fn requester_cannot_decide_own_request() {
        let me = Approver {
            user_id: 10,
            role_code: "SUPERVISOR",
            department_id: Some(2),
        };
        assert_eq!(
            leave_route()
                .decide(&pending(0), &me, Decision::Approved)
                .unwrap_err(),
            WorkflowError::OwnRequest
        );
    }

    #[test]
    fn snapshot_survives_json() {
        let route = leave_route();
        let restored = ApprovalRoute::from_json(&route.to_json()).unwrap();
        assert_eq!(restored, route);
        assert!(restored.involves_role("HEAD"));
        assert!(ApprovalRoute::from_json("[]").is_err());
    }

    #[test]
    fn pending_step_only_while_pending() {
        let route = leave_route();
        assert_eq!(route.pending_step(&pending(1)).unwrap().role_code, "SECRETARY");
        let mut done = pending(1);
        done.status = RequestStatus::Cancelled;
        assert!(route.pending_step(&done).is_none());
    }
}
