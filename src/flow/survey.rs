//! The chart-audit survey — every step definition for the plaque
//! psoriasis intake flow.
//!
//! The screener section (S1–S16) qualifies the respondent; the audit
//! section (Show/A/B/T steps) walks one patient chart. Branching rules
//! are authored as tagged variants: literal jumps, tagged range splits
//! for numeric gates, value maps for simple choice routing, and rule
//! expressions for everything conditional. The per-treatment date
//! chains are generated rather than written out by hand.

use crate::error::CatalogError;

use super::catalog::{Catalog, CatalogBuilder};
use super::step::{AnswerKind, SubField, step};

/// Steps served to the web form UI (the screener section).
pub const SCREENER_STEP_IDS: &[&str] = &[
    "S1", "S2", "S3", "S5", "S6", "S7", "S8", "S9", "S10", "S11", "S12_1", "S12_2", "S12_3",
    "S13_1", "S13_2", "S13_3", "S14", "S16",
];

/// Treatments in display order. The screener's T-section steps and the
/// generated date chains all derive from this list.
const TREATMENTS: [&str; 28] = [
    "OTC Topical",
    "Clobetasol",
    "Triamcinolone",
    "Betamethasone",
    "Halobetasol",
    "Calcipotriene",
    "Taclonex",
    "Fluocinonide",
    "Enstilar",
    "Duobrii",
    "Eucrisa",
    "Topicort",
    "VTAMA® (tapinarof)",
    "ZORYVE (roflumilast)",
    "Other Topical (Please specify)",
    "Otezla®",
    "Methotrexate",
    "Other Oral Systemics (e.g. leflunomide, sulfasalazine, etc.)",
    "Sotyktu",
    "Cosentyx®",
    "Taltz®",
    "Stelara®",
    "Tremfya®",
    "Skyrizi®",
    "Enbrel®",
    "Humira®",
    "Bimzelx® (bimekizumab)",
    "Other Biologic (Please specify)",
];

/// The eight branded biologics counted by the double-biologic check.
const BIOLOGICS: [&str; 8] = [
    "Cosentyx®",
    "Taltz®",
    "Stelara®",
    "Tremfya®",
    "Skyrizi®",
    "Enbrel®",
    "Humira®",
    "Bimzelx® (bimekizumab)",
];

fn topicals() -> &'static [&'static str] {
    &TREATMENTS[..15]
}

fn systemics() -> &'static [&'static str] {
    &TREATMENTS[15..]
}

const SELECTION_REASONS: [&str; 11] = [
    "Treatment Cost",
    "Insurance",
    "Patient Preference",
    "Accessibility",
    "Efficacy on addressing symptoms of the joints",
    "Efficacy on skin clearance",
    "Efficacy on DTTA & skin symptoms",
    "Product safety profile",
    "Improvement in QoL & Physical Function",
    "Dosing frequency",
    "Other (Please Specify)",
];

const STATES: [&str; 51] = [
    "Alabama", "Alaska", "Arizona", "Arkansas", "California", "Colorado", "Connecticut",
    "D.C. - District of Columbia", "Delaware", "Florida", "Georgia", "Hawaii", "Idaho",
    "Illinois", "Indiana", "Iowa", "Kansas", "Kentucky", "Louisiana", "Maine", "Maryland",
    "Massachusetts", "Michigan", "Minnesota", "Mississippi", "Missouri", "Montana", "Nebraska",
    "Nevada", "New Hampshire", "New Jersey", "New Mexico", "New York", "North Carolina",
    "North Dakota", "Ohio", "Oklahoma", "Oregon", "Pennsylvania", "Rhode Island",
    "South Carolina", "South Dakota", "Tennessee", "Texas", "Utah", "Vermont", "Virginia",
    "Washington", "West Virginia", "Wisconsin", "Wyoming",
];

/// Render a slice of option strings as a rule-expression list literal.
fn expr_set(items: &[&str]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| format!("'{s}'")).collect();
    format!("[{}]", quoted.join(", "))
}

/// The month the chart's treatment was initiated, as an interpolation slot.
const INITIATION_MONTH: &str =
    "{answers.A1_4 == 'Yes' ? 'July' : answers.A1_5 == 'Yes' ? 'August' : ''}";

/// Build the full chart-audit catalog. Validates every rule target and
/// expression; a clean build means the resolver can never hit a dangling
/// reference at runtime.
pub fn chart_audit_catalog() -> Result<Catalog, CatalogError> {
    let disqualifying_affiliations = expr_set(&[
        "Medical Equipment Manufacturer",
        "Market Research, Advertising or Media",
        "Government Drug Approval Organization",
        "Drug Reimbursement Organization",
        "Kaiser, Kaiser Permanente, the Permanente, or the Permanente Medical Group",
    ]);
    let pharma =
        "Pharmaceutical or Biotechnology manufacturer, distributor, retailer, wholesaler, or marketer of pharmaceutical products";
    let np_pa = expr_set(&["Nurse Practitioner (NP)", "Physician’s Assistant (PA)"]);
    let topical_set = expr_set(topicals());
    let systemic_set = expr_set(systemics());
    let biologic_set = expr_set(&BIOLOGICS);

    let mut builder = Catalog::builder("S1")
        // ── Screener ────────────────────────────────────────────────
        .step(
            step(
                "S1",
                "Do you or any member of your immediate family have any paid affiliation with the following? Select all that apply.",
                AnswerKind::MultiChoice,
            )
            .options([
                "Medical Equipment Manufacturer",
                "Market Research, Advertising or Media",
                "Government Drug Approval Organization",
                "Drug Reimbursement Organization",
                "Kaiser, Kaiser Permanente, the Permanente, or the Permanente Medical Group",
                pharma,
                "None of the above",
            ])
            .branch(&format!(
                "any(answers.S1, {disqualifying_affiliations}) ? 'DISQUALIFIED' : '{pharma}' in answers.S1 ? 'S2' : 'S3'"
            )),
        )
        .step(
            step(
                "S2",
                "Which of the following best describes your association with the Pharmaceutical Company or Biotechnology manufacturer you are associated with? Select all that apply.",
                AnswerKind::MultiChoice,
            )
            .show_if(&format!("'{pharma}' in answers.S1"))
            .options([
                "Paid consultant",
                "Advisory board member",
                "Clinical trial investigator",
                "Other (Please specify)",
                "None of the above",
            ])
            .branch(
                "any(answers.S2, ['Paid consultant', 'Clinical trial investigator', 'Other (Please specify)']) ? 'DISQUALIFIED' : 'S3'",
            ),
        )
        .step(
            step(
                "S3",
                "In which states are you currently practicing? Select all that apply.",
                AnswerKind::MultiChoice,
            )
            .options(STATES)
            .branch("'Vermont' in answers.S3 ? 'DISQUALIFIED' : 'S5'"),
        )
        .step(
            step("S5", "What is your primary medical specialty?", AnswerKind::SingleChoice)
                .options([
                    "General / Family / Primary care",
                    "Dermatology",
                    "Internal medicine",
                    "Nurse Practitioner (NP)",
                    "Physician’s Assistant (PA)",
                    "Other (Please specify)",
                ])
                .branch(
                    "answers.S5 in ['General / Family / Primary care', 'Internal medicine', 'Other (Please specify)'] ? 'DISQUALIFIED' : answers.S5 == 'Dermatology' ? 'S6' : 'S8'",
                ),
        )
        .step(
            step(
                "S6",
                "Are you currently board certified and / or board eligible in your area of specialty?",
                AnswerKind::SingleChoice,
            )
            .show_if("answers.S5 == 'Dermatology'")
            .options(["Board certified", "Board eligible", "Neither"])
            .branch("answers.S6 == 'Neither' ? 'DISQUALIFIED' : 'S7'"),
        )
        .step(
            step(
                "S7",
                "For how many years have you practiced in this specialty post-residency? If less than a year, please enter 1.",
                AnswerKind::Number,
            )
            .show_if("answers.S5 == 'Dermatology'")
            .min(2)
            .max(35)
            .range_split("S10", "DISQUALIFIED"),
        )
        .step(
            step(
                "S8",
                "Which of the following best describes the specialty of the practice you primarily work at?",
                AnswerKind::SingleChoice,
            )
            .show_if(&format!("answers.S5 in {np_pa}"))
            .options(["Dermatology", "Primary Care", "Other (Please specify)"])
            .branch("answers.S8 in ['Primary Care', 'Other (Please specify)'] ? 'DISQUALIFIED' : 'S9'"),
        )
        .step(
            step(
                "S9",
                "For how many years have you been practicing dermatology? If less than a year, please enter 1.",
                AnswerKind::Number,
            )
            .show_if(&format!("answers.S5 in {np_pa} && answers.S8 == 'Dermatology'"))
            .min(2)
            .max(35)
            .range_split("S10", "DISQUALIFIED"),
        )
        .step(
            step(
                "S10",
                "What percent of your time do you spend in clinical practice seeing patients?",
                AnswerKind::Number,
            )
            .min(70)
            .max(100)
            .range_split("S11", "DISQUALIFIED"),
        )
        .step(
            step(
                "S11",
                "Which of the following describes the setting in which you primarily practice?",
                AnswerKind::SingleChoice,
            )
            .options([
                "Private Practice, with or without a community hospital affiliation",
                "Private Practice, with Academic / teaching hospital affiliation",
                "Academic hospital / research center",
                "Community hospital",
                "Government funded / VA hospital",
                "Other (Please Specify)",
            ])
            .branch(
                "answers.S11 in ['Government funded / VA hospital', 'Other (Please Specify)'] ? 'DISQUALIFIED' : 'S12_1'",
            ),
        )
        .step(
            step(
                "S12_1",
                "How many adult (18+) plaque psoriasis patients with Mild disease do you currently manage in a typical 3-month period?",
                AnswerKind::Number,
            )
            .min(0)
            .range_split("S12_2", "DISQUALIFIED"),
        )
        .step(
            step(
                "S12_2",
                "How many adult (18+) plaque psoriasis patients with Moderate disease do you currently manage in a typical 3-month period?",
                AnswerKind::Number,
            )
            .min(0)
            .range_split("S12_3", "DISQUALIFIED"),
        )
        .step(
            step(
                "S12_3",
                "How many adult (18+) plaque psoriasis patients with Severe disease do you currently manage in a typical 3-month period?",
                AnswerKind::Number,
            )
            .min(0)
            .branch(&format!(
                "(answers.S5 == 'Dermatology' && int(answers.S12_1) + int(answers.S12_2) + int(answers.S12_3) < 70) || (answers.S5 in {np_pa} && int(answers.S12_1) + int(answers.S12_2) + int(answers.S12_3) < 50) ? 'DISQUALIFIED' : 'S13_1'"
            )),
        )
        .step(
            step(
                "S13_1",
                "Mild patients initiated on a new line of treatment in July and August 2025:",
                AnswerKind::Number,
            )
            .show_if("int(answers.S12_1) > 0")
            .min(0)
            .max_expr("int(answers.S12_1)")
            .range_split("S13_2", "DISQUALIFIED"),
        )
        .step(
            step(
                "S13_2",
                "Moderate patients initiated on a new line of treatment in July and August 2025:",
                AnswerKind::Number,
            )
            .show_if("int(answers.S12_2) > 0")
            .min(0)
            .max_expr("int(answers.S12_2)")
            .range_split("S13_3", "DISQUALIFIED"),
        )
        .step(
            step(
                "S13_3",
                "Severe patients initiated on a new line of treatment in July and August 2025:",
                AnswerKind::Number,
            )
            .show_if("int(answers.S12_3) > 0")
            .min(0)
            .max_expr("int(answers.S12_3)")
            .branch(&format!(
                "(int(answers.S13_1) + int(answers.S13_2) + int(answers.S13_3) < 4 && answers.S5 == 'Dermatology') || (int(answers.S13_1) + int(answers.S13_2) + int(answers.S13_3) < 3 && answers.S5 in {np_pa}) ? 'DISQUALIFIED' : 'S14'"
            )),
        )
        .step(
            step("S14", "Which of the following most accurately describes you?", AnswerKind::SingleChoice)
                .options([
                    "Female",
                    "Male",
                    "Non-binary",
                    "Transgender",
                    "Intersex",
                    "Other (Please Specify)",
                    "Prefer not to say",
                ])
                .goto("S16"),
        )
        .step(
            step(
                "S16",
                "Consent and Release Form: Market Research Interview/Survey. By selecting an option below, you certify that you are eighteen (18) years old or older, have read and understand the information above, and agree or do not agree to participate.",
                AnswerKind::SingleChoice,
            )
            .options(["I consent", "I do not consent"])
            .branch("answers.S16 == 'I do not consent' ? 'DISQUALIFIED' : 'COMPLETE'"),
        )
        // ── Chart selection screens ─────────────────────────────────
        .step(
            step(
                "Show_1",
                "To proceed, you will need at least 4 patient charts (up to 11) that meet the following conditions. Please select your qualified patient charts in July and August and proceed.",
                AnswerKind::Informational,
            )
            .show_if("answers.S5 == 'Dermatology'")
            .goto("Show_3"),
        )
        .step(
            step(
                "Show_2",
                "To proceed, you will need at least 3 patient charts (up to 9) that meet the following conditions. Please select your qualified patient charts in July and August and proceed.",
                AnswerKind::Informational,
            )
            .show_if(&format!("answers.S5 in {np_pa}"))
            .goto("Show_3"),
        )
        .step(
            step(
                "Show_3",
                "In order to capture accurate data, please make sure to select charts for entry that approximate your typical prescribing allocation. For example, if 25% of your plaque psoriasis patients were initiated on Treatment X, we ask that 25% of the charts you enter are for Treatment X.",
                AnswerKind::Informational,
            )
            .goto("A1_1"),
        )
        // ── Chart qualification ─────────────────────────────────────
        .step(
            step(
                "A1_1",
                "Please confirm: This patient has mild OR moderate plaque psoriasis with BSA between 2-10%.",
                AnswerKind::SingleChoice,
            )
            .options(["Yes", "No"])
            .goto("A1_2"),
        )
        .step(
            step(
                "A1_2",
                "Please confirm: This patient has severe plaque psoriasis with BSA above 10%.",
                AnswerKind::SingleChoice,
            )
            .options(["Yes", "No"])
            .goto("A1_3"),
        )
        .step(
            step("A1_3", "Please confirm: This patient is at least 18 years of age.", AnswerKind::SingleChoice)
                .options(["Yes", "No"])
                .goto("A1_4"),
        )
        .step(
            step(
                "A1_4",
                "Please confirm: This patient started on their current plaque psoriasis treatment in July 2025.",
                AnswerKind::SingleChoice,
            )
            .options(["Yes", "No"])
            .goto("A1_5"),
        )
        .step(
            step(
                "A1_5",
                "Please confirm: This patient started on their current plaque psoriasis treatment in August 2025.",
                AnswerKind::SingleChoice,
            )
            .options(["Yes", "No"])
            .branch(
                "answers.A1_1 == 'No' && answers.A1_2 == 'No' ? 'Show_4' : answers.A1_3 == 'No' ? 'Show_5' : answers.A1_1 == 'Yes' && answers.A1_2 == 'Yes' ? 'Show_6' : answers.A1_4 == 'Yes' && answers.A1_5 == 'Yes' ? 'Show_7' : 'A3'",
            ),
        )
        .step(
            step("Show_4", "Please select a patient chart that meets the required conditions.", AnswerKind::Informational)
                .goto("A1_1"),
        )
        .step(
            step("Show_5", "Please select a patient chart that meets the required conditions.", AnswerKind::Informational)
                .goto("A1_1"),
        )
        .step(
            step(
                "Show_6",
                "Previously, you indicated that this patient has both Mild/Moderate and Severe plaque psoriasis. Please go back and change your answer.",
                AnswerKind::Informational,
            )
            .goto("A1_1"),
        )
        .step(
            step(
                "Show_7",
                "Previously, you indicated that this patient started treatment in both July and August 2025. Please go back and change your answer.",
                AnswerKind::Informational,
            )
            .goto("A1_1"),
        )
        .step(
            step(
                "A3",
                &format!("At the time of the treatment initiation in {INITIATION_MONTH} 2025, did you consider this patient’s plaque psoriasis …?"),
                AnswerKind::SingleChoice,
            )
            .options(["Mild", "Moderate", "Severe"])
            .branch(
                "answers.A1_1 == 'Yes' && answers.A3 == 'Severe' ? 'Show_8' : answers.A1_2 == 'Yes' && answers.A3 in ['Mild', 'Moderate'] ? 'Show_9' : 'A2'",
            ),
        )
        .step(
            step(
                "Show_8",
                "Previously, you indicated that this patient has Mild or Moderate plaque psoriasis. Please go back and change your answer.",
                AnswerKind::Informational,
            )
            .goto("A1_1"),
        )
        .step(
            step(
                "Show_9",
                "Previously, you indicated that this patient has Severe plaque psoriasis. Please go back and change your answer.",
                AnswerKind::Informational,
            )
            .goto("A1_1"),
        )
        .step(
            step(
                "A2",
                &format!("At the time of the treatment initiation in {INITIATION_MONTH} 2025, what percentage of the patient’s body surface area (BSA) was affected by plaque psoriasis?"),
                AnswerKind::Number,
            )
            .min(0)
            .max(100)
            .branch(
                "int(answers.A2) < 2 ? 'Show_10' : answers.A1_1 == 'Yes' && int(answers.A2) > 10 ? 'Show_11' : answers.A1_2 == 'Yes' && int(answers.A2) <= 10 ? 'Show_12' : 'A4BN'",
            ),
        )
        .step(
            step(
                "Show_10",
                "Please select a patient chart with body surface area affected by plaque psoriasis more than 2%.",
                AnswerKind::Informational,
            )
            .goto("A1_1"),
        )
        .step(
            step(
                "Show_11",
                "Previously, you indicated that this patient has Mild or Moderate plaque psoriasis with BSA between 2-10%. Please go back and change your answer.",
                AnswerKind::Informational,
            )
            .goto("A1_1"),
        )
        .step(
            step(
                "Show_12",
                "Previously, you indicated that this patient has Severe plaque psoriasis with BSA above 10%. Please go back and change your answer.",
                AnswerKind::Informational,
            )
            .goto("A1_1"),
        )
        // ── Patient demographics ────────────────────────────────────
        .step(
            step(
                "A4BN",
                &format!("Had this patient ever been on a biologic (Anti-TNF, IL-17, IL-23, etc.) or Otezla or Sotyktu prior to {INITIATION_MONTH} 2025?"),
                AnswerKind::SingleChoice,
            )
            .options(["Yes", "No"])
            .goto("A4"),
        )
        .step(
            step("A4", "In what year was this patient born? (YYYY).", AnswerKind::Number)
                .min(1900)
                .max(2007)
                .range_split("A5", "A4"),
        )
        .step(
            step("A5", "What is this patient’s gender?", AnswerKind::SingleChoice)
                .options(["Female", "Male", "Non-binary", "Transgender", "Intersex", "Other (Please Specify)"])
                .goto("A6"),
        )
        .step(
            step("A6", "What is this person’s race/ethnicity? Select all that apply.", AnswerKind::MultiChoice)
                .options([
                    "Caucasian/White",
                    "African-American",
                    "Asian or Pacific Islander",
                    "Hispanic or Latino",
                    "Native American or Alaskan Native",
                    "Two or more races / ethnicities",
                    "Other (Please Specify)",
                ])
                .goto("A7"),
        )
        .step(
            step("A7", "What is this person’s height and weight?", AnswerKind::CompositeNumber)
                .options(["Don't know"])
                .sub_fields([
                    SubField { id: "ft".into(), label: "Height (ft)".into(), min: 2, max: 8 },
                    SubField { id: "in".into(), label: "Height (in)".into(), min: 0, max: 11 },
                    SubField { id: "lbs".into(), label: "Weight (lbs)".into(), min: 20, max: 500 },
                ])
                .goto("A9"),
        )
        .step(
            step("A9", "What is the patient’s primary type of health insurance?", AnswerKind::SingleChoice)
                .options([
                    "Private PPO/HMO/Indemnity",
                    "Medicare plus supplemental",
                    "Medicare only",
                    "Medicaid",
                    "Other insurance (Please Specify)",
                    "No insurance/Cash paying",
                    "Don’t know",
                ])
                .goto("B1a"),
        )
        // ── Disease history ─────────────────────────────────────────
        .step(
            step(
                "B1a",
                "At what age was the patient first diagnosed with plaque psoriasis? (years old)",
                AnswerKind::NumberOrUnknown,
            )
            .options(["Don't know"])
            .min(1)
            .max(99)
            .range_split_or_unknown("B2", "B1b", "B1b"),
        )
        .step(
            step("B1b", "What year was the patient first diagnosed with plaque psoriasis?", AnswerKind::NumberOrUnknown)
                .options(["Don't know"])
                .min(1900)
                .max(2024)
                .range_split_or_unknown("B2", "B2", "B2"),
        )
        .step(
            step("B2", "Does this patient have any of the following comorbidities? Select all that apply.", AnswerKind::MultiChoice)
                .options([
                    "Depression",
                    "Diabetes",
                    "Cardiovascular disease",
                    "High blood pressure",
                    "High cholesterol",
                    "Inflammatory bowel disease (including Crohn’s disease, ulcerative colitis, etc.)",
                    "Liver disease/liver abnormalities",
                    "Obesity",
                    "Rheumatoid arthritis",
                    "Skin cancer",
                    "Behçet’s Disease",
                    "Pulmonary conditions",
                    "Other (Please Specify)",
                    "None of the above",
                ])
                .goto("B3"),
        )
        .step(
            step(
                "B3",
                "Has this patient been diagnosed with Psoriatic Arthritis either by you or another physician?",
                AnswerKind::SingleChoice,
            )
            .options(["Yes", "No", "Don’t know"])
            .value_map([("Yes", "B5")], "B6"),
        )
        .step(
            step("B5", "Do you treat this patient’s Psoriatic Arthritis?", AnswerKind::SingleChoice)
                .show_if("answers.B3 == 'Yes'")
                .options(["Yes", "No, treated by Rheumatologist", "No, treated by another HCP"])
                .goto("B6"),
        )
        .step(
            step(
                "B6",
                &format!("At the time of treatment initiation in {INITIATION_MONTH} 2025, which areas of the patient’s body were affected by plaque psoriasis? Select all that apply."),
                AnswerKind::MultiChoice,
            )
            .options([
                "Nails", "Palms", "Soles", "Hand", "Feet", "Face", "Scalp", "Genitals",
                "Intertriginous areas", "Knees", "Legs", "Elbows", "Trunk", "Arms/forearms",
                "Back", "Neck", "Other (Please Specify)",
            ])
            .goto("B7"),
        )
        .step(
            step(
                "B7",
                "Which of the following plaque psoriasis symptoms was this patient experiencing? Select all that apply.",
                AnswerKind::MultiChoice,
            )
            .options([
                "Whole body itch", "Scalp itch", "Scales", "Painful skin", "Skin Redness",
                "Skin Thickness", "Skin Flaking", "Burning sensation", "Skin Bleeding",
                "Skin Stinging", "Skin tightness", "Joint pain, stiffness or swelling",
                "Nail changes (e.g., pitting, thickening, yellowing, etc.)", "Other (Please Specify)",
            ])
            .goto("B8"),
        )
        .step(
            step(
                "B8",
                "Please rate the impact of the patient’s plaque psoriasis on their quality of life. Use a 1-7 scale, with 1 = no impairment and 7 = severe impairment.",
                AnswerKind::Number,
            )
            .min(1)
            .max(7)
            .range_split("B10", "B8"),
        )
        .step(
            step("B10", "Over the last year, how many flares, if any, did this patient experience?", AnswerKind::Number)
                .min(0)
                .max(20)
                .range_split("T1", "T1"),
        )
        // ── Current treatment ───────────────────────────────────────
        .step(
            step(
                "T1",
                &format!("Please select the patient’s current treatment(s) which were first prescribed in {INITIATION_MONTH} 2025. Select all that apply."),
                AnswerKind::MultiChoice,
            )
            .options(TREATMENTS)
            .goto("T1b_1"),
        );

    builder = prescription_date_steps(builder, &topical_set, &systemic_set, &biologic_set);

    builder = builder
        .step(
            step(
                "Show_13",
                "You mentioned that this patient has severe plaque psoriasis and was prescribed only topical treatment. Would you please confirm that this is correct?",
                AnswerKind::Informational,
            )
            .goto("T7"),
        )
        .step(
            step(
                "Show_14",
                &format!(
                    "You mentioned that this patient was placed on the following biologics: {{join(selected(answers.T1, {biologic_set}), ', ')}}. Would you please confirm that this is correct?"
                ),
                AnswerKind::Informational,
            )
            .goto("T7"),
        )
        .step(
            step("T7", "Does the patient struggle with the current treatment?", AnswerKind::SingleChoice)
                .show_if(&format!(
                    "answers.A4BN == 'No' && !any(answers.T1, {})",
                    expr_set(&["Cosentyx®", "Taltz®", "Stelara®", "Tremfya®", "Skyrizi®", "Enbrel®", "Humira®", "Bimzelx® (bimekizumab)", "Otezla®", "Sotyktu"]),
                ))
                .options(["Yes", "No"])
                .branch("answers.T7 == 'Yes' ? 'T7a' : 'T8'"),
        )
        .step(
            step("T7a", "Please explain why the patient is struggling with their current treatment clinically.", AnswerKind::FreeText)
                .show_if("answers.T7 == 'Yes'")
                .goto("T7b"),
        )
        .step(
            step("T7b", "Please explain why the patient is struggling with their current treatment non-clinically.", AnswerKind::FreeText)
                .show_if("answers.T7 == 'Yes'")
                .goto("T8"),
        )
        .step(
            step(
                "T8",
                "How many topicals have you personally prescribed this patient up to and including their current treatment? Please only include treatments you have prescribed, not ones they may have been on previously with another provider.",
                AnswerKind::Number,
            )
            .show_if(&format!(
                "any(answers.T1, {topical_set}) && !any(answers.T1, {systemic_set})"
            ))
            .min(0)
            .range_split("T1z", "T1z"),
        )
        .step(
            step("T1z", "Which ZORYVE product was prescribed to this patient?", AnswerKind::SingleChoice)
                .show_if("'ZORYVE (roflumilast)' in answers.T1")
                .options(["Cream", "Foam", "Both"])
                .branch("answers.T1z == 'Foam' ? 'T1zf' : 'T2a_1'"),
        )
        .step(
            step("T1zf", "What was ZORYVE prescribed for?", AnswerKind::SingleChoice)
                .show_if("answers.T1z == 'Foam'")
                .options([
                    "Seborrheic dermatitis",
                    "Psoriasis on the body",
                    "Psoriasis on the scalp",
                    "Psoriasis on both the body and scalp",
                    "Other use (please specify)",
                ])
                .goto("T2a_1"),
        )
        // ── Why this therapy ────────────────────────────────────────
        .step(
            step(
                "T2a_1",
                "Please select the primary reason why you selected this therapy for this patient: {nth(answers.T1, 1)}",
                AnswerKind::SingleChoice,
            )
            .show_if("len(answers.T1) >= 1")
            .options(SELECTION_REASONS)
            .goto("T2a_2"),
        )
        .step(
            step(
                "T2a_2",
                "Please select the primary reason why you selected this therapy for this patient: {nth(answers.T1, 2)}",
                AnswerKind::SingleChoice,
            )
            .show_if("len(answers.T1) >= 2")
            .options(SELECTION_REASONS)
            .goto("T2a_3"),
        )
        .step(
            step(
                "T2a_3",
                "Please select the primary reason why you selected this therapy for this patient: {nth(answers.T1, 3)}",
                AnswerKind::SingleChoice,
            )
            .show_if("len(answers.T1) >= 3")
            .options(SELECTION_REASONS)
            .goto("T2b_1"),
        )
        .step(
            step(
                "T2b_1",
                "Select any additional reasons for choosing: {nth(answers.T1, 1)}. Select all that apply.",
                AnswerKind::MultiChoice,
            )
            .show_if("len(answers.T1) >= 1")
            .options(additional_reasons())
            .goto("T2b_2"),
        )
        .step(
            step(
                "T2b_2",
                "Select any additional reasons for choosing: {nth(answers.T1, 2)}. Select all that apply.",
                AnswerKind::MultiChoice,
            )
            .show_if("len(answers.T1) >= 2")
            .options(additional_reasons())
            .goto("T2b_3"),
        )
        .step(
            step(
                "T2b_3",
                "Select any additional reasons for choosing: {nth(answers.T1, 3)}. Select all that apply.",
                AnswerKind::MultiChoice,
            )
            .show_if("len(answers.T1) >= 3")
            .options(additional_reasons())
            .branch(
                "any(answers.T1, ['VTAMA® (tapinarof)', 'ZORYVE (roflumilast)']) ? 'T2c' : 'T3_A'",
            ),
        )
        .step(
            step(
                "T2c",
                "We are trying to understand more about your prescription approach towards {join(selected(answers.T1, ['VTAMA® (tapinarof)', 'ZORYVE (roflumilast)']), ', ')}. Why did you select this therapy for this patient?",
                AnswerKind::SingleChoice,
            )
            .show_if("any(answers.T1, ['VTAMA® (tapinarof)', 'ZORYVE (roflumilast)'])")
            .options([
                "I want to keep the patient on a topical but need better efficacy than topical steroids can provide",
                "I want to keep the patient on a topical and this is safer than topical steroid",
                "I want to delay the potential use of a systemic treatment on this patient",
                "I think I may avoid systemics altogether with this novel topical on this patient",
                "I want to try it since it is newer available treatment class",
                "I had an available sample to give this patient",
                "Other (please specify)",
            ])
            .goto("T3_A"),
        )
        // ── Alternatives ────────────────────────────────────────────
        .step(
            step(
                "T3_A",
                "If this patient’s current therapy(ies) had not been available, which treatments would you have placed this patient on? Rank up to 3 choices. Column A for {nth(answers.T1, 1)}.",
                AnswerKind::MultiChoice,
            )
            .show_if("len(answers.T1) >= 1")
            .options(TREATMENTS)
            .goto("T3_B"),
        )
        .step(
            step(
                "T3_B",
                "Alternative treatments for Column B {nth(answers.T1, 2)}. Rank up to 3 choices.",
                AnswerKind::MultiChoice,
            )
            .show_if("len(answers.T1) >= 2")
            .options(TREATMENTS)
            .goto("T3_C"),
        )
        .step(
            step(
                "T3_C",
                "Alternative treatments for Column C {nth(answers.T1, 3)}. Rank up to 3 choices.",
                AnswerKind::MultiChoice,
            )
            .show_if("len(answers.T1) >= 3")
            .options(TREATMENTS)
            .goto("T4_A"),
        )
        .step(
            step(
                "T4_A",
                "Why did you ultimately choose {nth(answers.T1, 1)} over the first alternative treatment option selected in Column A? Select up to 2 reasons.",
                AnswerKind::MultiChoice,
            )
            .show_if("len(answers.T1) >= 1 && len(answers.T3_A) >= 1")
            .options(choice_over_alternative_reasons())
            .goto("T4_B"),
        )
        .step(
            step(
                "T4_B",
                "Why did you ultimately choose {nth(answers.T1, 2)} over the first alternative treatment option selected in Column B? Select up to 2 reasons.",
                AnswerKind::MultiChoice,
            )
            .show_if("len(answers.T1) >= 2 && len(answers.T3_B) >= 1")
            .options(choice_over_alternative_reasons())
            .goto("T4_C"),
        )
        .step(
            step(
                "T4_C",
                "Why did you ultimately choose {nth(answers.T1, 3)} over the first alternative treatment option selected in Column C? Select up to 2 reasons.",
                AnswerKind::MultiChoice,
            )
            .show_if("len(answers.T1) >= 3 && len(answers.T3_C) >= 1")
            .options(choice_over_alternative_reasons())
            .goto("T9"),
        )
        // ── Systemic-treatment attitudes ────────────────────────────
        .step(
            step(
                "T9",
                "Why was systemic treatment not considered for this patient? Select all that apply.",
                AnswerKind::MultiChoice,
            )
            .show_if(&format!(
                "any(answers.T1, {topical_set}) && !any(answers.T1, {systemic_set})"
            ))
            .options([
                "Affordability / out-of-pocket costs",
                "Insurance coverage",
                "Patient has more concerning comorbidities",
                "Concerns about patient compliance",
                "Patient refusal",
                "Patient history with potential side effects",
                "Patient preference for non-systemic treatment",
                "Don’t expect patient’s psoriasis to progress / worsen",
                "Patient is contraindicated",
                "Patient is needle averse",
                "Don’t want to have to conduct initial / ongoing labs",
                "Current medication was effective enough",
                "Other (Please specify)",
            ])
            .branch("'Patient refusal' in answers.T9 ? 'T9A' : 'A3BSA'"),
        )
        .step(
            step(
                "T9A",
                "Why did this patient refuse your recommendation for systemic treatment? Select all that apply.",
                AnswerKind::MultiChoice,
            )
            .show_if("'Patient refusal' in answers.T9")
            .options([
                "Concern about affordability / out of pocket costs",
                "Concern it wouldn’t be covered by insurance",
                "Patient decided current medication was effective enough",
                "Patient refusal due to more concerning comorbidities",
                "Patient preferred less aggressive therapy",
                "Patient concern with potential side effects",
                "Patient preference for specific ROA",
                "Patient did not understand the long-term, systemic implications of having uncontrolled PsO",
                "Patient is needle averse",
                "Patient did not want to have to do initial / on-going labs",
                "Inability to start on treatment today / immediately",
                "Other (Please specify)",
            ])
            .goto("A3BSA"),
        )
        .step(
            step(
                "A3BSA",
                "How likely is this patient to go on systemic treatment for their plaque psoriasis within the next year?",
                AnswerKind::SingleChoice,
            )
            .show_if(&format!(
                "any(answers.T1, {topical_set}) && !any(answers.T1, {systemic_set})"
            ))
            .options(["Very unlikely", "Unlikely", "Somewhat unlikely", "Somewhat likely", "Likely", "Very likely"])
            .branch(
                "answers.A3BSA in ['Somewhat likely', 'Likely', 'Very likely'] ? 'A5BSA' : 'A10'",
            ),
        )
        .step(
            step(
                "A5BSA",
                "You mentioned this patient is at least somewhat likely to go onto systemic treatment. What are the reasons why this patient is expected to go on a systemic treatment in the future? Select up to 3 reasons.",
                AnswerKind::MultiChoice,
            )
            .show_if("answers.A3BSA in ['Somewhat likely', 'Likely', 'Very likely']")
            .options([
                "Patient has insufficient skin clearance on topicals alone",
                "Patient has a difficult to treat psoriasis area (e.g., scalp, genital, palms)",
                "Patient symptoms are not controlled (e.g., itch, skin tightness)",
                "Patient is experiencing frequent flares",
                "Patient’s plaque presentation (e.g., thick plaques, thick scales)",
                "I expect the patient’s psoriasis to progress / worsen",
                "Current PsO presentation indicates signs of PsA (e.g., nail PsO)",
                "Patient is growing tired of topicals",
                "Patient’s self-esteem and / or quality of life is becoming impacted",
                "Future insurance changes may approve systemic treatment",
                "Patient has family history of more severe PsO and / or active PsA",
                "Patient has begun asking about systemic treatment",
                "PsO is a chronic disease and may need a systemic in the long-term",
                "Other (Please specify)",
            ])
            .goto("A4BSA"),
        )
        .step(
            step("A4BSA", "In how many months from now would you expect this patient to start systemic treatment?", AnswerKind::NumberOrUnknown)
                .options(["Don’t know"])
                .min(0)
                .max(24)
                .show_if("answers.A3BSA in ['Somewhat likely', 'Likely', 'Very likely']")
                .range_split_or_unknown("A6BSA", "A6BSA", "A6BSA"),
        )
        .step(
            step("A6BSA", "What systemic treatment are you most likely to start this patient on? Select one.", AnswerKind::SingleChoice)
                .show_if("answers.A3BSA in ['Somewhat likely', 'Likely', 'Very likely']")
                .options(systemics().to_vec())
                .goto("A10"),
        )
        // ── Patient preferences ─────────────────────────────────────
        .step(
            step("A10", "Did this patient request a specific product by name or description?", AnswerKind::SingleChoice)
                .options(["Yes", "No"])
                .branch("answers.A10 == 'Yes' ? 'A10a' : 'A8'"),
        )
        .step(
            step("A10a", "Which product did this patient request?", AnswerKind::SingleChoice)
                .show_if("answers.A10 == 'Yes'")
                .options([
                    "Otezla®", "Skyrizi®", "Humira®", "VTAMA® (tapinarof)", "ZORYVE (roflumilast)",
                    "Sotyktu", "Taltz®", "Stelara®", "Tremfya®", "Cosentyx®", "Bimzelx® (bimekizumab)",
                ])
                .goto("A10B"),
        )
        .step(
            step("A10B", "What was the main reason this patient requested {answers.A10a}?", AnswerKind::FreeText)
                .show_if("answers.A10 == 'Yes'")
                .goto("A8"),
        )
        .step(
            step(
                "A8",
                "Rank three most important factors for this patient when considering treatment options for plaque psoriasis.",
                AnswerKind::MultiChoice,
            )
            .options([
                "Affordability",
                "Route of administration",
                "Dosing frequency",
                "Speed of onset",
                "Tolerability/side effects",
                "Out-of-pocket cost",
                "Ease of patient access",
                "Reduction in the amount of medications/treatments patient has to take overall",
                "Product that patient trusts",
                "Side effects",
                "Long-lasting effect",
                "Doctor recommendation",
                "Doesn’t need monitoring by a doctor",
                "No need for Lab work",
                "Other (please specify)",
            ])
            .goto("A11"),
        )
        .step(
            step("A11", "What is this patient’s attitude towards the route of administration?", AnswerKind::SingleChoice)
                .options([
                    "Patient prefers oral treatment over self-injection",
                    "Patient does not express a specific preference",
                    "Patient prefers self-injection over oral treatment",
                ])
                .goto("T6"),
        )
        // ── Treatment history ───────────────────────────────────────
        .step(
            step(
                "T6",
                &format!(
                    "Other than the patient’s current plaque psoriasis treatments {{join(answers.T1, ', ')}}, what treatments has this patient started in the past 3 years (since {INITIATION_MONTH} 2022)? Select all that apply."
                ),
                AnswerKind::MultiChoice,
            )
            .options(history_options())
            .goto("T6b_1"),
        );

    builder = history_date_steps(builder);

    builder = builder
        .step(
            step(
                "T6_none_check",
                "Confirmation: You said that this patient has had no other treatments in the past 3 years. Please go back and change your answer or confirm this is correct.",
                AnswerKind::Informational,
            )
            .show_if("'None' in answers.T6")
            .goto("T6"),
        )
        .step(
            step(
                "T6none",
                &format!(
                    "Please explain why you did not prescribe any treatment for this patient before prescribing {{join(selected(answers.T1, {}), ', ')}}.",
                    expr_set(&["Otezla®", "Cosentyx®", "Taltz®", "Stelara®", "Tremfya®", "Skyrizi®", "Enbrel®", "Humira®", "Sotyktu", "Bimzelx® (bimekizumab)"]),
                ),
            AnswerKind::FreeText,
            )
            .show_if(&format!(
                "'None' in answers.T6 && any(answers.T1, {})",
                expr_set(&["Otezla®", "Cosentyx®", "Taltz®", "Stelara®", "Tremfya®", "Skyrizi®", "Enbrel®", "Humira®", "Sotyktu", "Bimzelx® (bimekizumab)"]),
            ))
            .goto("COMPLETE"),
        );

    builder.build()
}

fn additional_reasons() -> Vec<&'static str> {
    let mut reasons: Vec<&str> = SELECTION_REASONS.to_vec();
    reasons.push("I don’t have additional reasons");
    reasons
}

fn choice_over_alternative_reasons() -> [&'static str; 7] {
    [
        "Patient Influence",
        "MD Habit",
        "Clinical Efficacy",
        "Safety & Tolerability",
        "Insurance",
        "Decreased dosing frequency",
        "Other (Please specify)",
    ]
}

fn history_options() -> Vec<&'static str> {
    let mut options: Vec<&str> = TREATMENTS.to_vec();
    options.push("Phototherapy");
    options.push("None");
    options
}

/// Short display name for an "Other …" treatment ("Other Topical (Please
/// specify)" → "Other Topical").
fn short_name(treatment: &str) -> &str {
    treatment.split(" (").next().unwrap_or(treatment)
}

/// One "date prescribed" step per current treatment, chained in order,
/// each visible only when its treatment was selected at T1. The three
/// "Other …" entries get an extra free-text "please specify" step. The
/// final step of the chain carries the consistency checks: topical-only
/// on severe BSA goes to Show_13, two or more branded biologics to
/// Show_14, everything else to T7.
fn prescription_date_steps(
    mut builder: CatalogBuilder,
    topical_set: &str,
    systemic_set: &str,
    biologic_set: &str,
) -> CatalogBuilder {
    let chain_exit = format!(
        "any(answers.T1, {topical_set}) && int(answers.A2) > 10 && !any(answers.T1, {systemic_set}) ? 'Show_13' : count(answers.T1, {biologic_set}) >= 2 ? 'Show_14' : 'T7'"
    );

    let count = TREATMENTS.len();
    for (i, treatment) in TREATMENTS.iter().copied().enumerate() {
        let n = i + 1;
        let id = format!("T1b_{n}");
        let visible = format!("'{treatment}' in answers.T1");
        let needs_spec = treatment.starts_with("Other ");
        let spec_id = format!("T1b_{n}_spec");
        let next = if n < count {
            format!("T1b_{}", n + 1)
        } else {
            String::new()
        };

        let display = if needs_spec { short_name(treatment) } else { treatment };
        let date_question = format!("Date prescribed for {display} (YYYY-MM-DD).");
        let date_next = if needs_spec { spec_id.clone() } else { next.clone() };

        let mut date_step =
            step(&id, &date_question, AnswerKind::FreeText).show_if(&visible);
        date_step = if !needs_spec && n == count {
            date_step.branch(&chain_exit)
        } else {
            date_step.goto(&date_next)
        };
        builder = builder.step(date_step);

        if needs_spec {
            let spec_question = format!("Please specify the {}.", short_name(treatment));
            let mut spec_step =
                step(&spec_id, &spec_question, AnswerKind::FreeText).show_if(&visible);
            spec_step = if n == count {
                spec_step.branch(&chain_exit)
            } else {
                spec_step.goto(&next)
            };
            builder = builder.step(spec_step);
        }
    }
    builder
}

/// First/last administration date pairs for every prior treatment named
/// at T6, chained in order and ending at the "None" consistency check.
fn history_date_steps(mut builder: CatalogBuilder) -> CatalogBuilder {
    let mut prior: Vec<&str> = TREATMENTS.to_vec();
    prior.push("Phototherapy");

    let count = prior.len();
    for (i, treatment) in prior.iter().copied().enumerate() {
        let n = i + 1;
        let visible = format!("'{treatment}' in answers.T6");
        let first_id = format!("T6b_{n}");
        let last_id = format!("T6c_{n}");
        let next = if n < count {
            format!("T6b_{}", n + 1)
        } else {
            "T6_none_check".to_string()
        };
        let display = if treatment.starts_with("Other ") {
            short_name(treatment)
        } else {
            treatment
        };

        builder = builder
            .step(
                step(
                    &first_id,
                    &format!("Date of first administration for {display} (YYYY-MM-DD)."),
                    AnswerKind::FreeText,
                )
                .show_if(&visible)
                .goto(&last_id),
            )
            .step(
                step(
                    &last_id,
                    &format!("Date of last administration for {display} (YYYY-MM-DD)."),
                    AnswerKind::FreeText,
                )
                .show_if(&visible)
                .goto(&next),
            );
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::answer::{Answer, AnswerSet};
    use crate::flow::render::render_step;
    use crate::flow::resolver::{DisqualifyCause, Resolution, resolve};
    use crate::flow::session::{Engine, Position, SubmitOutcome};
    use std::sync::Arc;

    fn catalog() -> Catalog {
        chart_audit_catalog().expect("shipped catalog must build cleanly")
    }

    #[test]
    fn catalog_builds_and_validates() {
        let catalog = catalog();
        assert_eq!(catalog.entry(), "S1");
        // Screener + audit + both generated date chains.
        assert!(catalog.len() > 120, "unexpectedly small catalog: {}", catalog.len());
        for id in SCREENER_STEP_IDS {
            assert!(catalog.contains(id), "missing screener step {id}");
        }
        assert!(catalog.contains("T1b_28_spec"));
        assert!(catalog.contains("T6c_29"));
        assert!(catalog.contains("T6none"));
    }

    #[test]
    fn pharma_affiliation_routes_to_s2_not_disqualification() {
        let catalog = catalog();
        let s1 = catalog.get("S1").unwrap();
        let answer = Answer::multi([
            "Pharmaceutical or Biotechnology manufacturer, distributor, retailer, wholesaler, or marketer of pharmaceutical products",
        ]);
        assert_eq!(
            resolve(s1, &answer, &AnswerSet::new()),
            Resolution::Next("S2".into())
        );
    }

    #[test]
    fn medical_equipment_affiliation_disqualifies_regardless() {
        let catalog = catalog();
        let s1 = catalog.get("S1").unwrap();
        let answer = Answer::multi([
            "Medical Equipment Manufacturer",
            "Pharmaceutical or Biotechnology manufacturer, distributor, retailer, wholesaler, or marketer of pharmaceutical products",
        ]);
        assert!(matches!(
            resolve(s1, &answer, &AnswerSet::new()),
            Resolution::Disqualified(DisqualifyCause::Rule { step }) if step == "S1"
        ));
    }

    #[test]
    fn no_affiliation_skips_s2() {
        let catalog = catalog();
        let s1 = catalog.get("S1").unwrap();
        assert_eq!(
            resolve(s1, &Answer::multi(["None of the above"]), &AnswerSet::new()),
            Resolution::Next("S3".into())
        );
    }

    #[test]
    fn s7_years_in_practice_gate() {
        let catalog = catalog();
        let s7 = catalog.get("S7").unwrap();
        assert!(matches!(
            resolve(s7, &Answer::scalar("1"), &AnswerSet::new()),
            Resolution::Disqualified(_)
        ));
        assert_eq!(
            resolve(s7, &Answer::scalar("5"), &AnswerSet::new()),
            Resolution::Next("S10".into())
        );
        // Inclusive at both bounds.
        assert_eq!(resolve(s7, &Answer::Numeric(2), &AnswerSet::new()), Resolution::Next("S10".into()));
        assert_eq!(resolve(s7, &Answer::Numeric(35), &AnswerSet::new()), Resolution::Next("S10".into()));
    }

    #[test]
    fn vermont_disqualifies() {
        let catalog = catalog();
        let s3 = catalog.get("S3").unwrap();
        assert!(matches!(
            resolve(s3, &Answer::multi(["Ohio", "Vermont"]), &AnswerSet::new()),
            Resolution::Disqualified(_)
        ));
        assert_eq!(
            resolve(s3, &Answer::multi(["Ohio"]), &AnswerSet::new()),
            Resolution::Next("S5".into())
        );
    }

    #[test]
    fn patient_volume_threshold_depends_on_specialty() {
        let catalog = catalog();
        let s12_3 = catalog.get("S12_3").unwrap();

        let mut derm = AnswerSet::new();
        derm.insert("S5", Answer::scalar("Dermatology"));
        derm.insert("S12_1", Answer::Numeric(30));
        derm.insert("S12_2", Answer::Numeric(30));
        // 30 + 30 + 5 = 65 < 70 for dermatologists.
        assert!(matches!(
            resolve(s12_3, &Answer::Numeric(5), &derm),
            Resolution::Disqualified(_)
        ));
        // 30 + 30 + 10 = 70 qualifies.
        assert_eq!(
            resolve(s12_3, &Answer::Numeric(10), &derm),
            Resolution::Next("S13_1".into())
        );

        let mut np = AnswerSet::new();
        np.insert("S5", Answer::scalar("Nurse Practitioner (NP)"));
        np.insert("S12_1", Answer::Numeric(30));
        np.insert("S12_2", Answer::Numeric(15));
        // 30 + 15 + 5 = 50 meets the NP/PA threshold.
        assert_eq!(
            resolve(s12_3, &Answer::Numeric(5), &np),
            Resolution::Next("S13_1".into())
        );
    }

    #[test]
    fn s13_max_is_bounded_by_s12_answer() {
        let catalog = catalog();
        let s13_1 = catalog.get("S13_1").unwrap();
        let mut answers = AnswerSet::new();
        answers.insert("S12_1", Answer::Numeric(5));

        use crate::flow::validator::{Verdict, validate};
        assert_eq!(validate(s13_1, &Answer::Numeric(5), &answers), Verdict::Accept);
        match validate(s13_1, &Answer::Numeric(6), &answers) {
            Verdict::Reject(msg) => assert_eq!(msg, "Please enter a number between 0 and 5."),
            Verdict::Accept => panic!("answer above the earlier count must be rejected"),
        }
    }

    #[test]
    fn declined_consent_disqualifies_granted_consent_completes() {
        let catalog = catalog();
        let s16 = catalog.get("S16").unwrap();
        assert_eq!(
            resolve(s16, &Answer::scalar("I consent"), &AnswerSet::new()),
            Resolution::Complete
        );
        assert!(matches!(
            resolve(s16, &Answer::scalar("I do not consent"), &AnswerSet::new()),
            Resolution::Disqualified(_)
        ));
    }

    #[test]
    fn initiation_month_interpolates_from_chart_answers() {
        let catalog = catalog();
        let a3 = catalog.get("A3").unwrap();

        let mut july = AnswerSet::new();
        july.insert("A1_4", Answer::scalar("Yes"));
        assert!(render_step(a3, &july).question.contains("in July 2025"));

        let mut august = AnswerSet::new();
        august.insert("A1_4", Answer::scalar("No"));
        august.insert("A1_5", Answer::scalar("Yes"));
        assert!(render_step(a3, &august).question.contains("in August 2025"));
    }

    #[test]
    fn double_biologic_chart_is_flagged_for_confirmation() {
        let catalog = catalog();
        let chain_end = catalog.get("T1b_28_spec").unwrap();
        let mut answers = AnswerSet::new();
        answers.insert("T1", Answer::multi(["Skyrizi®", "Humira®", "Other Biologic (Please specify)"]));
        answers.insert("A2", Answer::Numeric(8));

        assert_eq!(
            resolve(chain_end, &Answer::scalar("2025-07-14"), &answers),
            Resolution::Next("Show_14".into())
        );

        let show_14 = catalog.get("Show_14").unwrap();
        let rendered = render_step(show_14, &answers);
        assert!(rendered.question.contains("Skyrizi®, Humira®"));
    }

    #[test]
    fn severe_bsa_on_topicals_only_is_flagged() {
        let catalog = catalog();
        let chain_end = catalog.get("T1b_28_spec").unwrap();
        let mut answers = AnswerSet::new();
        answers.insert("T1", Answer::multi(["Clobetasol", "Other Biologic (Please specify)"]));
        answers.insert("A2", Answer::Numeric(40));

        // A biologic is present, so the topical-only check does not fire;
        // with only one biologic the double-biologic check doesn't either.
        assert_eq!(
            resolve(chain_end, &Answer::scalar("2025-07-14"), &answers),
            Resolution::Next("T7".into())
        );

        let mut topical_only = AnswerSet::new();
        topical_only.insert("T1", Answer::multi(["Clobetasol", "Enstilar"]));
        topical_only.insert("A2", Answer::Numeric(40));
        // The chain end is reached via whichever date step was last shown;
        // the rule itself only reads T1 and A2.
        assert_eq!(
            resolve(chain_end, &Answer::scalar("2025-07-14"), &topical_only),
            Resolution::Next("Show_13".into())
        );
    }

    #[test]
    fn qualified_screener_walk_ends_complete() {
        let engine = Engine::new(Arc::new(catalog()));
        let mut state = engine.new_session();

        let script: &[(&str, Answer)] = &[
            ("S1", Answer::multi(["None of the above"])),
            ("S3", Answer::multi(["Ohio"])),
            ("S5", Answer::scalar("Dermatology")),
            ("S6", Answer::scalar("Board certified")),
            ("S7", Answer::Numeric(12)),
            ("S10", Answer::Numeric(80)),
            (
                "S11",
                Answer::scalar("Private Practice, with or without a community hospital affiliation"),
            ),
            ("S12_1", Answer::Numeric(30)),
            ("S12_2", Answer::Numeric(30)),
            ("S12_3", Answer::Numeric(30)),
            ("S13_1", Answer::Numeric(10)),
            ("S13_2", Answer::Numeric(10)),
            ("S13_3", Answer::Numeric(10)),
            ("S14", Answer::scalar("Female")),
            ("S16", Answer::scalar("I consent")),
        ];

        for (expected_step, answer) in script {
            assert_eq!(
                state.current,
                Position::Step(expected_step.to_string()),
                "unexpected position before answering {expected_step}"
            );
            let outcome = engine.submit(&mut state, answer.clone(), false);
            assert!(
                !matches!(outcome, SubmitOutcome::Invalid { .. } | SubmitOutcome::Disqualified { .. }),
                "unexpected outcome at {expected_step}: {outcome:?}"
            );
        }
        assert_eq!(state.current, Position::Complete);
        assert_eq!(state.history.len(), script.len());
    }

    #[test]
    fn screener_projection_contains_only_screener_steps() {
        let catalog = catalog();
        let view = catalog.project(SCREENER_STEP_IDS);
        assert_eq!(view.len(), SCREENER_STEP_IDS.len());
        assert!(view.iter().all(|s| s.id.starts_with('S')));
        assert_eq!(view[0].id, "S1");
    }
}
