//! Simulation checks and resource preparation
//!
//! A simulation either carries an error string, which is surfaced verbatim
//! and never retried, or a result whose footprint gets merged into the
//! envelope before signing.

use super::envelope::{Envelope, ResourceFootprint, ScVal};
use super::errors::LifecycleError;
use crate::rpc::{SimulationResponse, SimulationResult};

const UNKNOWN_SIMULATION_ERROR: &str = "Unknown simulation error";

/// Turn a raw simulation response into its result, or a `Simulation` error
pub fn check_simulation(response: &SimulationResponse) -> Result<&SimulationResult, LifecycleError> {
    if let Some(err) = &response.error {
        return Err(LifecycleError::simulation_failed(err.clone()));
    }
    response
        .result
        .as_ref()
        .ok_or_else(|| LifecycleError::simulation_failed(UNKNOWN_SIMULATION_ERROR))
}

/// Return value of a successful simulation
pub fn simulated_return(response: &SimulationResponse) -> Result<ScVal, LifecycleError> {
    check_simulation(response)?
        .retval
        .clone()
        .ok_or_else(|| LifecycleError::unexpected_return("simulation returned no value"))
}

/// Merge the simulated resource footprint into the envelope.
///
/// Fee becomes base fee plus the minimum resource fee. Preparing twice is an
/// error, the footprint would otherwise be counted twice.
pub fn prepare(mut envelope: Envelope, response: &SimulationResponse) -> Result<Envelope, LifecycleError> {
    let result = check_simulation(response)?;
    if envelope.is_prepared() {
        return Err(LifecycleError::internal("envelope already prepared"));
    }

    let transaction_data = response
        .transaction_data
        .clone()
        .ok_or_else(|| LifecycleError::simulation_failed("simulation returned no resource data"))?;
    let min_resource_fee = response.min_resource_fee.unwrap_or(0);

    envelope.fee = envelope
        .fee
        .checked_add(min_resource_fee)
        .ok_or_else(|| LifecycleError::Build("fee overflow".to_string()))?;
    envelope.resources = Some(ResourceFootprint {
        transaction_data,
        min_resource_fee,
        auth: result.auth.clone(),
    });
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_builder::envelope::{Invocation, TimeBounds};
    use crate::types::Address;

    fn envelope() -> Envelope {
        Envelope {
            source: Address::zero_account(),
            sequence: 1,
            fee: 100,
            network_passphrase: "Test SDF Network ; September 2015".to_string(),
            time_bounds: TimeBounds {
                min_time: 0,
                max_time: 30,
            },
            invocation: Invocation::new(
                Address::parse("CB253GUKVRSRD47JFA2G4JBKNEEVTX7TMM6L6WCWBXVDAE2DYSUNCLSZ").unwrap(),
                "balance",
                vec![ScVal::Address(Address::zero_account())],
            ),
            resources: None,
            signatures: vec![],
        }
    }

    fn ok_response() -> SimulationResponse {
        SimulationResponse {
            result: Some(SimulationResult {
                retval: Some(ScVal::I128(12_345_678)),
                auth: vec!["auth-entry".to_string()],
            }),
            transaction_data: Some("AAAA".to_string()),
            min_resource_fee: Some(5_000),
            ..Default::default()
        }
    }

    #[test]
    fn test_error_field_surfaces_verbatim() {
        let resp = SimulationResponse {
            error: Some("HostError: Error(WasmVm, InvalidAction)".to_string()),
            ..Default::default()
        };
        let err = check_simulation(&resp).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Simulation failed: HostError: Error(WasmVm, InvalidAction)"
        );
    }

    #[test]
    fn test_missing_result_is_unknown_error() {
        let err = check_simulation(&SimulationResponse::default()).unwrap_err();
        assert_eq!(err.to_string(), "Simulation failed: Unknown simulation error");
    }

    #[test]
    fn test_prepare_merges_footprint() {
        let prepared = prepare(envelope(), &ok_response()).unwrap();
        assert_eq!(prepared.fee, 5_100);
        let resources = prepared.resources.unwrap();
        assert_eq!(resources.transaction_data, "AAAA");
        assert_eq!(resources.auth, vec!["auth-entry".to_string()]);
    }

    #[test]
    fn test_prepare_twice_is_rejected() {
        let prepared = prepare(envelope(), &ok_response()).unwrap();
        assert!(matches!(
            prepare(prepared, &ok_response()),
            Err(LifecycleError::Internal(_))
        ));
    }

    #[test]
    fn test_simulated_return() {
        assert_eq!(simulated_return(&ok_response()).unwrap(), ScVal::I128(12_345_678));

        let mut no_value = ok_response();
        no_value.result = Some(SimulationResult {
            retval: None,
            auth: vec![],
        });
        assert!(matches!(
            simulated_return(&no_value),
            Err(LifecycleError::ReturnValue(_))
        ));
    }
}
