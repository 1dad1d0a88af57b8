//! Interactive question/answer collection of one customer record

use std::io::{BufRead, Write};
use std::str::FromStr;

use crate::error::ChurnError;
use crate::schema::CustomerRecord;

/// One question per modeling field, in the order they are asked
const QUESTIONS: [(&str, &str); 19] = [
    ("gender", "Enter Gender (Male/Female): "),
    ("SeniorCitizen", "Are you a Senior Citizen? Enter 1 for Yes and 0 for No: "),
    ("Partner", "Do you have a partner? (Yes/No): "),
    ("Dependents", "Do you have dependents? (Yes/No): "),
    ("tenure", "How many months have you been with the company? (e.g., 18): "),
    ("PhoneService", "Do you have phone service? (Yes/No): "),
    ("MultipleLines", "Do you have multiple phone lines? (Yes/No/No phone service): "),
    ("InternetService", "What type of internet service do you have? (DSL/Fiber optic/No): "),
    ("OnlineSecurity", "Do you have online security? (Yes/No/No internet service): "),
    ("OnlineBackup", "Do you have online backup? (Yes/No/No internet service): "),
    ("DeviceProtection", "Do you have device protection? (Yes/No/No internet service): "),
    ("TechSupport", "Do you have tech support? (Yes/No/No internet service): "),
    ("StreamingTV", "Do you stream TV? (Yes/No/No internet service): "),
    ("StreamingMovies", "Do you stream movies? (Yes/No/No internet service): "),
    ("Contract", "What is your contract type? (Month-to-month/One year/Two year): "),
    ("PaperlessBilling", "Do you use paperless billing? (Yes/No): "),
    (
        "PaymentMethod",
        "What is your payment method? (Electronic check/Mailed check/Bank transfer (automatic)/Credit card (automatic)): ",
    ),
    ("MonthlyCharges", "What is your monthly charge? (e.g., 50.3): "),
    ("TotalCharges", "What is your total charge to date? (e.g., 913.3): "),
];

/// Ask for every modeling field and build a record from the answers.
///
/// Answers are trimmed. Integer fields (`SeniorCitizen`, `tenure`) and the
/// two charge fields must parse as numbers; the first one that does not, or
/// running out of input, ends collection with `InvalidInput`.
pub fn collect_record<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> crate::Result<CustomerRecord> {
    let mut record = CustomerRecord::default();

    for (field, question) in QUESTIONS {
        write!(output, "{question}")?;
        output.flush()?;

        let answer = read_answer(input, field)?;
        match field {
            "SeniorCitizen" => record.senior_citizen = parse_answer(field, &answer, "integer")?,
            "tenure" => record.tenure = parse_answer(field, &answer, "non-negative integer")?,
            "MonthlyCharges" => record.monthly_charges = parse_number(field, &answer)?,
            "TotalCharges" => record.total_charges = parse_number(field, &answer)?,
            _ => {
                if let Some(slot) = record.categorical_mut(field) {
                    *slot = answer;
                }
            }
        }
    }

    Ok(record)
}

fn read_answer<R: BufRead>(input: &mut R, field: &str) -> crate::Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(ChurnError::InvalidInput {
            field: field.to_string(),
            value: String::new(),
            expected: "answer (input ended)",
        });
    }
    Ok(line.trim().to_string())
}

fn parse_answer<T: FromStr>(field: &str, answer: &str, expected: &'static str) -> crate::Result<T> {
    answer.parse().map_err(|_| ChurnError::InvalidInput {
        field: field.to_string(),
        value: answer.to_string(),
        expected,
    })
}

fn parse_number(field: &str, answer: &str) -> crate::Result<f64> {
    parse_answer::<f64>(field, answer, "number").and_then(|value| {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ChurnError::InvalidInput {
                field: field.to_string(),
                value: answer.to_string(),
                expected: "finite number",
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const ANSWERS: [&str; 19] = [
        "Female",
        "0",
        "Yes",
        "No",
        " 18 ",
        "Yes",
        "No",
        "Fiber optic",
        "No",
        "Yes",
        "No",
        "No",
        "Yes",
        "Yes",
        "Month-to-month",
        "Yes",
        "Electronic check",
        "50.3",
        "913.3",
    ];

    fn run(answers: &[&str]) -> (crate::Result<CustomerRecord>, String) {
        let mut input = Cursor::new(answers.join("\n"));
        let mut output = Vec::new();
        let result = collect_record(&mut input, &mut output);
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_collects_every_field_in_order() {
        let (result, transcript) = run(&ANSWERS);
        let record = result.unwrap();

        assert_eq!(record.gender, "Female");
        assert_eq!(record.tenure, 18);
        assert_eq!(record.internet_service, "Fiber optic");
        assert_eq!(record.contract, "Month-to-month");
        assert_eq!(record.payment_method, "Electronic check");
        assert_eq!(record.monthly_charges, 50.3);
        assert_eq!(record.total_charges, 913.3);

        let gender_at = transcript.find("Enter Gender").unwrap();
        let total_at = transcript.find("total charge to date").unwrap();
        assert!(gender_at < total_at);
    }

    #[test]
    fn test_non_numeric_tenure_stops_collection() {
        let mut answers = ANSWERS;
        answers[4] = "eighteen";
        let (result, transcript) = run(&answers);

        match result {
            Err(ChurnError::InvalidInput { field, value, .. }) => {
                assert_eq!(field, "tenure");
                assert_eq!(value, "eighteen");
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
        // Nothing after the failing question is asked
        assert!(!transcript.contains("phone service"));
    }

    #[test]
    fn test_non_numeric_charges_rejected() {
        let mut answers = ANSWERS;
        answers[17] = "fifty";
        let (result, _) = run(&answers);
        assert!(matches!(
            result,
            Err(ChurnError::InvalidInput { ref field, .. }) if field == "MonthlyCharges"
        ));
    }

    #[test]
    fn test_truncated_input() {
        let (result, _) = run(&ANSWERS[..5]);
        assert!(matches!(
            result,
            Err(ChurnError::InvalidInput { ref field, .. }) if field == "PhoneService"
        ));
    }
}
