//! Conversions between generated prost messages and control-plane types

use crate::error::ProtocolError;
use crate::message::{
    FirmwareRequest, OsVersion, RebootMethod, RebootRequest, RebootStatus, UpdatePhase,
    UpdateProgress,
};
use crate::proto::{os, sonic, system};

use sonic::update_firmware_status::State;

impl From<os::VerifyResponse> for OsVersion {
    fn from(resp: os::VerifyResponse) -> Self {
        Self {
            version: resp.version,
            activation_fail_message: resp.activation_fail_message,
        }
    }
}

impl From<system::RebootStatusResponse> for RebootStatus {
    fn from(resp: system::RebootStatusResponse) -> Self {
        Self {
            active: resp.active,
            reason: resp.reason,
        }
    }
}

impl From<RebootMethod> for system::RebootMethod {
    fn from(method: RebootMethod) -> Self {
        match method {
            RebootMethod::Cold => Self::Cold,
            RebootMethod::Warm => Self::Warm,
            RebootMethod::Powerdown => Self::Powerdown,
            RebootMethod::Halt => Self::Halt,
        }
    }
}

impl From<&RebootRequest> for system::RebootRequest {
    fn from(req: &RebootRequest) -> Self {
        Self {
            method: system::RebootMethod::from(req.method) as i32,
            delay: 0,
            message: req.message.clone(),
            force: req.force,
        }
    }
}

impl From<&FirmwareRequest> for sonic::UpdateFirmwareRequest {
    fn from(req: &FirmwareRequest) -> Self {
        Self {
            request: Some(sonic::update_firmware_request::Request::FirmwareUpdate(
                sonic::FirmwareUpdateParams {
                    firmware_source: req.firmware_source.clone(),
                    update_mlnx_cpld_fw: req.update_mlnx_cpld_fw,
                },
            )),
        }
    }
}

impl From<sonic::FirmwareUpdateParams> for FirmwareRequest {
    fn from(params: sonic::FirmwareUpdateParams) -> Self {
        Self {
            firmware_source: params.firmware_source,
            update_mlnx_cpld_fw: params.update_mlnx_cpld_fw,
        }
    }
}

impl From<State> for UpdatePhase {
    fn from(state: State) -> Self {
        match state {
            State::Started => Self::Started,
            State::Running => Self::Running,
            State::Succeeded => Self::Succeeded,
            State::Failed => Self::Failed,
        }
    }
}

impl From<UpdatePhase> for State {
    fn from(phase: UpdatePhase) -> Self {
        match phase {
            UpdatePhase::Started => Self::Started,
            UpdatePhase::Running => Self::Running,
            UpdatePhase::Succeeded => Self::Succeeded,
            UpdatePhase::Failed => Self::Failed,
        }
    }
}

impl TryFrom<sonic::UpdateFirmwareStatus> for UpdateProgress {
    type Error = ProtocolError;

    fn try_from(status: sonic::UpdateFirmwareStatus) -> Result<Self, Self::Error> {
        let state = State::try_from(status.state)
            .map_err(|_| ProtocolError::UnknownUpdateState(status.state))?;
        let phase = UpdatePhase::from(state);

        // The exit code field is only defined for failed updates
        let exit_code = match phase {
            UpdatePhase::Failed => Some(status.exit_code),
            _ => None,
        };

        Ok(Self {
            log_line: status.log_line,
            phase,
            exit_code,
        })
    }
}

impl From<&UpdateProgress> for sonic::UpdateFirmwareStatus {
    fn from(progress: &UpdateProgress) -> Self {
        Self {
            log_line: progress.log_line.clone(),
            state: State::from(progress.phase) as i32,
            exit_code: progress.exit_code.unwrap_or(0),
        }
    }
}
