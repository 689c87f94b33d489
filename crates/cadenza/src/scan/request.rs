use crate::error::ContractViolation;
use cadenza_protocol::CreateLibraryArgs;

/// Validated input for one scan job.
///
/// Only constructible through [`ScanRequest::from_parts`] or
/// [`ScanRequest::new`], so an orchestrator never sees a request without a
/// name or locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    name: String,
    scan_locations: Vec<String>,
}

impl ScanRequest {
    /// Check the caller's inputs. Fails before any job exists.
    pub fn from_parts(
        name: Option<String>,
        scan_locations: Option<Vec<String>>,
    ) -> Result<Self, ContractViolation> {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or(ContractViolation::MissingName)?;

        let scan_locations = scan_locations
            .filter(|locations| !locations.is_empty())
            .ok_or(ContractViolation::MissingScanLocations)?;

        if let Some(index) = scan_locations.iter().position(|l| l.trim().is_empty()) {
            return Err(ContractViolation::BlankScanLocation { index });
        }

        Ok(Self {
            name,
            scan_locations,
        })
    }

    pub fn new<I, S>(name: impl Into<String>, scan_locations: I) -> Result<Self, ContractViolation>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_parts(
            Some(name.into()),
            Some(scan_locations.into_iter().map(Into::into).collect()),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scan_locations(&self) -> &[String] {
        &self.scan_locations
    }

    pub fn to_args(&self) -> CreateLibraryArgs {
        CreateLibraryArgs {
            name: self.name.clone(),
            scan_locations: self.scan_locations.clone(),
        }
    }
}
