use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::frame::{Column, Frame, FrameError};

const CONTINENTS: [(&str, f64, f64); 6] = [
    ("Asia", 0.66, 0.0),
    ("Europe", 0.15, 0.8),
    ("North America", 0.13, -0.2),
    ("South America", 0.03, -0.4),
    ("Africa", 0.02, 0.3),
    ("Oceania", 0.01, 0.0),
];
const EDUCATION: [(&str, f64, f64); 4] = [
    ("Bachelor's", 0.40, 0.0),
    ("Master's", 0.38, 1.2),
    ("High School", 0.13, -1.8),
    ("Doctorate", 0.09, 1.8),
];
const REGIONS: [(&str, f64, f64); 5] = [
    ("Northeast", 0.28, 0.0),
    ("South", 0.28, 0.1),
    ("West", 0.26, -0.1),
    ("Midwest", 0.17, 0.4),
    ("Island", 0.01, -0.3),
];
const UNITS: [(&str, f64, f64); 4] = [
    ("Year", 0.90, 0.5),
    ("Hour", 0.08, -2.0),
    ("Week", 0.01, 0.0),
    ("Month", 0.01, 0.0),
];

fn pick<'a>(rng: &mut SmallRng, table: &[(&'a str, f64, f64)]) -> (&'a str, f64) {
    let mut roll: f64 = rng.gen();
    for &(name, weight, effect) in table {
        if roll < weight {
            return (name, effect);
        }
        roll -= weight;
    }
    let (name, _, effect) = table[table.len() - 1];
    (name, effect)
}

fn yes_no(rng: &mut SmallRng, p_yes: f64) -> bool {
    rng.gen_bool(p_yes)
}

fn flag(value: bool) -> String {
    if value { "Y" } else { "N" }.to_string()
}

/// Deterministic synthetic visa applications with the raw dataset's twelve
/// columns. Roughly two thirds are `Certified`; the label depends mostly on
/// education, job experience and wage unit.
pub fn synthetic_visa_frame(rows: usize, seed: u64) -> Result<Frame, FrameError> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut case_id = Vec::with_capacity(rows);
    let mut continent = Vec::with_capacity(rows);
    let mut education = Vec::with_capacity(rows);
    let mut experience = Vec::with_capacity(rows);
    let mut training = Vec::with_capacity(rows);
    let mut employees = Vec::with_capacity(rows);
    let mut established = Vec::with_capacity(rows);
    let mut region = Vec::with_capacity(rows);
    let mut wage = Vec::with_capacity(rows);
    let mut unit = Vec::with_capacity(rows);
    let mut full_time = Vec::with_capacity(rows);
    let mut status = Vec::with_capacity(rows);

    for idx in 0..rows {
        let (cont, cont_effect) = pick(&mut rng, &CONTINENTS);
        let (edu, edu_effect) = pick(&mut rng, &EDUCATION);
        let (reg, reg_effect) = pick(&mut rng, &REGIONS);
        let (wage_unit, unit_effect) = pick(&mut rng, &UNITS);
        let has_experience = yes_no(&mut rng, 0.58);
        let needs_training = yes_no(&mut rng, 0.12);
        let is_full_time = yes_no(&mut rng, 0.89);
        let amount: f64 = match wage_unit {
            "Hour" => rng.gen_range(10.0..120.0),
            "Week" => rng.gen_range(400.0..3_000.0),
            "Month" => rng.gen_range(2_000.0..15_000.0),
            _ => rng.gen_range(15_000.0..200_000.0),
        };
        let wage_effect = if wage_unit == "Year" {
            (amount - 75_000.0) / 100_000.0
        } else {
            0.0
        };
        let noise = rng.gen_range(-0.6..0.6) + rng.gen_range(-0.6..0.6);
        let score = -0.8
            + edu_effect
            + cont_effect
            + reg_effect
            + unit_effect
            + wage_effect
            + if has_experience { 0.9 } else { -0.4 }
            + if needs_training { -0.2 } else { 0.0 }
            + noise;

        case_id.push(format!("EZYV{:05}", idx + 1));
        continent.push(cont.to_string());
        education.push(edu.to_string());
        experience.push(flag(has_experience));
        training.push(flag(needs_training));
        employees.push(rng.gen_range(3.0f64..11.0).exp().round());
        established.push(f64::from(rng.gen_range(1850_i32..=2016)));
        region.push(reg.to_string());
        wage.push((amount * 100.0).round() / 100.0);
        unit.push(wage_unit.to_string());
        full_time.push(flag(is_full_time));
        status.push(if score > 0.0 { "Certified" } else { "Denied" }.to_string());
    }

    Frame::from_columns([
        ("case_id", Column::Text(case_id)),
        ("continent", Column::Text(continent)),
        ("education_of_employee", Column::Text(education)),
        ("has_job_experience", Column::Text(experience)),
        ("requires_job_training", Column::Text(training)),
        ("no_of_employees", Column::Numeric(employees)),
        ("yr_of_estab", Column::Numeric(established)),
        ("region_of_employment", Column::Text(region)),
        ("prevailing_wage", Column::Numeric(wage)),
        ("unit_of_wage", Column::Text(unit)),
        ("full_time_position", Column::Text(full_time)),
        ("case_status", Column::Text(status)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_per_seed() {
        assert_eq!(synthetic_visa_frame(50, 1).unwrap(), synthetic_visa_frame(50, 1).unwrap());
        assert_ne!(synthetic_visa_frame(50, 1).unwrap(), synthetic_visa_frame(50, 2).unwrap());
    }

    #[test]
    fn has_raw_layout_and_both_labels() {
        let frame = synthetic_visa_frame(600, 42).unwrap();
        assert_eq!(frame.n_rows(), 600);
        assert_eq!(frame.n_cols(), 12);
        let labels = frame.column("case_status").unwrap().labels();
        let denied = labels.iter().filter(|label| *label == "Denied").count();
        assert!(denied > 60 && denied < 300, "denied = {denied}");
        assert!(frame.numeric("yr_of_estab").unwrap().iter().all(|y| (1850.0..=2016.0).contains(y)));
    }
}
