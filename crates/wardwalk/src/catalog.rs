//! Built-in hospital-management workflows.
//!
//! Each workflow is plain scenario data built on the shared login flow, so
//! adding one never touches the engine. Record data is a parameter: pass a
//! fresh [`PatientForm`] (see [`PatientForm::with_suffix`]) to keep repeated
//! runs from colliding on the same record.
//!
//! The edit, delete and cancel steps act on the *first* table row. The
//! application lists the most recent record first, so these steps assume
//! the record created earlier in the same scenario renders there.

use serde::{Deserialize, Serialize};

use crate::locator::ElementReference;
use crate::result::{WardwalkError, WardwalkResult};
use crate::scenario::{Credentials, Scenario, Step};
use crate::wait::Readiness;

/// Names accepted by [`builtin`]
pub const BUILTIN_SCENARIOS: &[&str] = &["patient-crud", "appointment-crud", "lab-report-create"];

fn button(text: &str) -> ElementReference {
    ElementReference::tagged_text("button", text)
}

fn link(text: &str) -> ElementReference {
    ElementReference::tagged_text("a", text)
}

fn field(id: &str, value: &str) -> Step {
    Step::type_text(ElementReference::id(id), value).with_label(id)
}

/// Input of a Material UI text field, located by its visible label
fn labelled_input(label: &str) -> ElementReference {
    ElementReference::xpath(format!(
        "//label[normalize-space()='{label}']/following-sibling::div//input"
    ))
}

/// Data typed into the patient registration form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatientForm {
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD`
    pub date_of_birth: String,
    pub contact_number: String,
    pub email: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub emergency_name: String,
    pub emergency_relationship: String,
    pub emergency_phone: String,
    pub insurance_provider: String,
    pub policy_number: String,
    pub group_number: String,
    /// Contact number written by the edit step
    pub updated_contact_number: String,
}

impl Default for PatientForm {
    fn default() -> Self {
        Self::sample()
    }
}

impl PatientForm {
    /// The record the manual regression suite registers
    #[must_use]
    pub fn sample() -> Self {
        Self {
            first_name: "test 1".to_string(),
            last_name: "test 2".to_string(),
            date_of_birth: "2000-05-10".to_string(),
            contact_number: "0711234567".to_string(),
            email: "test@gmail.com".to_string(),
            street: "test street".to_string(),
            city: "test city".to_string(),
            state: "test state".to_string(),
            zip_code: "21000".to_string(),
            emergency_name: "test rel".to_string(),
            emergency_relationship: "test relationship".to_string(),
            emergency_phone: "0711234567".to_string(),
            insurance_provider: "test provider".to_string(),
            policy_number: "12345".to_string(),
            group_number: "12345".to_string(),
            updated_contact_number: "0774526789".to_string(),
        }
    }

    /// Sample record made unique by `suffix` (name and email)
    #[must_use]
    pub fn with_suffix(suffix: impl std::fmt::Display) -> Self {
        let mut form = Self::sample();
        form.first_name = format!("test {suffix}");
        form.email = format!("test+{suffix}@gmail.com");
        form
    }
}

/// Data for the appointment scheduling form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppointmentForm {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    pub purpose: String,
    pub notes: String,
    /// Purpose written by the edit step
    pub updated_purpose: String,
}

impl Default for AppointmentForm {
    fn default() -> Self {
        Self {
            date: "2025-05-10".to_string(),
            time: "14:30".to_string(),
            purpose: "Test purpose".to_string(),
            notes: "Test note".to_string(),
            updated_purpose: "updated purpose".to_string(),
        }
    }
}

/// Data for the lab report form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabReportForm {
    /// Typed into the patient autocomplete to filter it down to one entry
    pub patient_query: String,
    /// Typed into the doctor autocomplete
    pub doctor_query: String,
    pub test_type: String,
    /// `MM/DD/YYYY`, as the date picker expects
    pub test_date: String,
    pub results: String,
    pub normal_range: String,
    pub unit: String,
}

impl Default for LabReportForm {
    fn default() -> Self {
        Self {
            patient_query: "test 1".to_string(),
            doctor_query: "doctor".to_string(),
            test_type: "Blood Sugar".to_string(),
            test_date: "05/10/2025".to_string(),
            results: "110".to_string(),
            normal_range: "70-140".to_string(),
            unit: "mg/dL".to_string(),
        }
    }
}

/// Register a patient, edit the first row's contact number, delete the first row
pub fn patient_crud(credentials: Credentials, form: &PatientForm) -> WardwalkResult<Scenario> {
    Scenario::builder("patient-crud", credentials)
        .description("Register a patient, edit their contact number, then delete them")
        .step(
            Step::click(ElementReference::id("register-patient-button"))
                .with_label("open registration"),
        )
        .step(field("firstName", &form.first_name))
        .step(field("lastName", &form.last_name))
        .step(field("dateOfBirth", &form.date_of_birth).without_value_check())
        .select_first(ElementReference::id("gender"), "gender")
        .step(field("contactNumber", &form.contact_number))
        .step(field("email", &form.email))
        .step(field("street", &form.street))
        .step(field("city", &form.city))
        .step(field("state", &form.state))
        .step(field("zipCode", &form.zip_code))
        .step(field("emergencyName", &form.emergency_name))
        .step(field("emergencyRelationship", &form.emergency_relationship))
        .step(field("emergencyPhone", &form.emergency_phone))
        .step(field("insuranceProvider", &form.insurance_provider))
        .step(field("policyNumber", &form.policy_number))
        .step(field("groupNumber", &form.group_number))
        .step(Step::click(button("Register Patient")).with_label("submit registration"))
        .step(Step::click(link("Patients")).with_label("open patient list"))
        .step(
            Step::click(ElementReference::first_row_button(6, 2)).with_label("edit first patient"),
        )
        .step(
            Step::type_text(
                ElementReference::attribute("name", "contactNumber"),
                form.updated_contact_number.clone(),
            )
            .with_label("update contact number"),
        )
        .step(Step::click(button("Save Changes")).with_label("save patient"))
        .step(Step::click(link("Patients")).with_label("back to patient list"))
        .step(
            Step::click(ElementReference::first_row_button(6, 3))
                .with_label("delete first patient"),
        )
        .step(
            Step::click(button("Delete"))
                .with_predicate(Readiness::Clickable)
                .with_label("confirm delete"),
        )
        .build()
}

/// Schedule an appointment, edit the first row's purpose, cancel the first row
pub fn appointment_crud(
    credentials: Credentials,
    form: &AppointmentForm,
) -> WardwalkResult<Scenario> {
    Scenario::builder("appointment-crud", credentials)
        .description("Schedule an appointment, edit its purpose, then cancel it")
        .step(
            Step::click(ElementReference::id("schedule-appointment-button"))
                .with_label("open scheduling"),
        )
        .select_first(ElementReference::id("patient-select"), "patient")
        .select_first(ElementReference::id("doctor-select"), "doctor")
        .step(field("appointment-date", &form.date).without_value_check())
        .step(field("appointment-time", &form.time).without_value_check())
        .step(field("purpose", &form.purpose))
        .select_first(ElementReference::id("status"), "status")
        .step(field("notes", &form.notes))
        .step(Step::click(button("Schedule Appointment")).with_label("submit appointment"))
        .step(
            Step::click(ElementReference::first_row_button(7, 1))
                .with_label("edit first appointment"),
        )
        .step(
            Step::type_text(
                ElementReference::attribute("name", "purpose"),
                form.updated_purpose.clone(),
            )
            .with_label("update purpose"),
        )
        .step(Step::click(button("Save Changes")).with_label("save appointment"))
        .step(
            Step::click(ElementReference::first_row_button(7, 2))
                .with_label("cancel first appointment"),
        )
        .step(
            Step::click(button("Yes, Cancel Appointment"))
                .with_predicate(Readiness::Clickable)
                .with_label("confirm cancellation"),
        )
        .build()
}

/// Create a lab report for the first patient and doctor matching the queries
pub fn lab_report_create(
    credentials: Credentials,
    form: &LabReportForm,
) -> WardwalkResult<Scenario> {
    let text = |name: &str, value: &str| {
        Step::type_text(ElementReference::attribute("name", name), value).with_label(name)
    };
    Scenario::builder("lab-report-create", credentials)
        .description("Create a lab report through the report form")
        .step(
            Step::navigate("/lab-reports/create")
                .with_target(ElementReference::attribute("name", "testType"))
                .with_predicate(Readiness::Visible)
                .with_label("open report form"),
        )
        // autocomplete inputs keep the typed filter as their value
        .step(
            Step::type_text(labelled_input("Patient"), form.patient_query.clone())
                .with_label("filter patients"),
        )
        .pick_first("patient")
        .step(
            Step::type_text(labelled_input("Doctor"), form.doctor_query.clone())
                .with_label("filter doctors"),
        )
        .pick_first("doctor")
        .step(text("testType", &form.test_type))
        .step(
            Step::type_text(labelled_input("Test Date"), form.test_date.clone())
                .without_value_check()
                .with_label("test date"),
        )
        .step(text("results", &form.results))
        .step(text("normalRange", &form.normal_range))
        .step(text("unit", &form.unit))
        .step(Step::click(button("Create Report")).with_label("submit report"))
        .build()
}

/// Built-in scenario by name, with default form data
pub fn builtin(name: &str, credentials: Credentials) -> WardwalkResult<Scenario> {
    match name {
        "patient-crud" => patient_crud(credentials, &PatientForm::sample()),
        "appointment-crud" => appointment_crud(credentials, &AppointmentForm::default()),
        "lab-report-create" => lab_report_create(credentials, &LabReportForm::default()),
        _ => Err(WardwalkError::UnknownScenario {
            name: name.to_string(),
        }),
    }
}

/// Every built-in scenario, in [`BUILTIN_SCENARIOS`] order
pub fn all(credentials: &Credentials) -> WardwalkResult<Vec<Scenario>> {
    BUILTIN_SCENARIOS
        .iter()
        .map(|name| builtin(name, credentials.clone()))
        .collect()
}
