//! Column layout and value formatting for report rows.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::pipeline::EnrichedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    PatientFirstName,
    PatientLastName,
    PatientDob,
    Id,
    AccessionId,
    RequisitionNumber,
    Barcode,
    CreatedAt,
    ClinicId,
    ClinicExternalId,
    Salesforces,
    ClinicName,
    ClinicBarcodeVolume,
    ClinicEmrEnabledOn,
    PatchSubmitter,
    Vendors,
    ProductId,
    ProductName,
    TestOfferingNames,
    OrderFlow,
    PatchChannelCount,
    OrderSampleCount,
    Converted,
}

impl Column {
    /// Key of the column in a rendered row.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::PatientFirstName => "patient_first_name",
            Self::PatientLastName => "patient_last_name",
            Self::PatientDob => "patient_dob",
            Self::Id => "id",
            Self::AccessionId => "accession_id",
            Self::RequisitionNumber => "requisition_number",
            Self::Barcode => "barcode",
            Self::CreatedAt => "created_at",
            Self::ClinicId => "clinic_id",
            Self::ClinicExternalId => "clinic_external_id",
            Self::Salesforces => "salesforces",
            Self::ClinicName => "clinic_name",
            Self::ClinicBarcodeVolume => "clinic_barcode_volume",
            Self::ClinicEmrEnabledOn => "clinic_emr_enabled_on",
            Self::PatchSubmitter => "patch_submitter",
            Self::Vendors => "vendors",
            Self::ProductId => "product_id",
            Self::ProductName => "product_name",
            Self::TestOfferingNames => "test_offering_names",
            Self::OrderFlow => "order_flow",
            Self::PatchChannelCount => "patch_channel_count",
            Self::OrderSampleCount => "order_sample_count",
            Self::Converted => "converted",
        }
    }

    const fn is_patient_name(self) -> bool {
        matches!(self, Self::PatientFirstName | Self::PatientLastName)
    }

    fn value(self, record: &EnrichedRecord) -> Value {
        let order = &record.order;
        match self {
            Self::PatientFirstName => Value::from(initial(&order.patient_first_name)),
            Self::PatientLastName => Value::from(initial(&order.patient_last_name)),
            Self::PatientDob => Value::from(order.patient_dob.map(|dob| dob.to_string())),
            Self::Id => Value::from(order.id),
            Self::AccessionId => Value::from(order.accession_id.clone()),
            Self::RequisitionNumber => Value::from(order.requisition_number.clone()),
            Self::Barcode => Value::from(order.barcode.clone()),
            Self::CreatedAt => Value::from(naive_utc(order.created_at)),
            Self::ClinicId => Value::from(order.clinic_id),
            Self::ClinicExternalId => Value::from(record.clinic_external_id.clone()),
            Self::Salesforces => Value::from(record.salesforces.clone()),
            Self::ClinicName => Value::from(record.clinic_name.clone()),
            Self::ClinicBarcodeVolume => Value::from(record.clinic_barcode_volume),
            Self::ClinicEmrEnabledOn => Value::from(record.clinic_emr_enabled_on.map(naive_utc)),
            Self::PatchSubmitter => Value::from(record.patch_submitter.clone()),
            Self::Vendors => Value::from(record.vendors.clone()),
            Self::ProductId => Value::from(order.product_id),
            Self::ProductName => Value::from(order.product_name.clone()),
            Self::TestOfferingNames => Value::from(record.test_offering_names.clone()),
            Self::OrderFlow => Value::from(order.order_flow.as_deref().and_then(order_flow_label)),
            Self::PatchChannelCount => Value::from(record.patch_channel_count),
            Self::OrderSampleCount => Value::from(record.order_sample_count),
            Self::Converted => Value::from(if record.converted {
                "converted"
            } else {
                "not converted"
            }),
        }
    }
}

/// Which columns a report row carries, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLayout {
    columns: Vec<Column>,
    show_names: bool,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            columns: vec![
                Column::PatientFirstName,
                Column::PatientLastName,
                Column::PatientDob,
                Column::Id,
                Column::AccessionId,
                Column::RequisitionNumber,
                Column::Barcode,
                Column::CreatedAt,
                Column::ClinicExternalId,
                Column::Salesforces,
                Column::ClinicName,
                Column::ClinicBarcodeVolume,
                Column::ClinicEmrEnabledOn,
                Column::PatchSubmitter,
                Column::Vendors,
                Column::ProductId,
                Column::ProductName,
                Column::TestOfferingNames,
                Column::OrderFlow,
                Column::PatchChannelCount,
                Column::OrderSampleCount,
                Column::Converted,
            ],
            show_names: false,
        }
    }
}

impl ReportLayout {
    #[must_use]
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            show_names: false,
        }
    }

    /// Patient name columns are dropped unless this is set; shown names are
    /// reduced to their initials.
    #[must_use]
    pub fn with_show_names(mut self, show_names: bool) -> Self {
        self.show_names = show_names;
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns
            .iter()
            .copied()
            .filter(|column| self.show_names || !column.is_patient_name())
    }

    #[must_use]
    pub fn render_row(&self, record: &EnrichedRecord) -> Map<String, Value> {
        self.columns()
            .map(|column| (column.key().to_string(), column.value(record)))
            .collect()
    }
}

fn initial(name: &str) -> String {
    name.chars().next().map(String::from).unwrap_or_default()
}

fn naive_utc(timestamp: DateTime<Utc>) -> String {
    timestamp.naive_utc().to_string()
}

/// Display label for an order flow slug: `emr_integration` becomes `Emr Integration`.
fn order_flow_label(slug: &str) -> Option<String> {
    let words: Vec<String> = slug
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}
