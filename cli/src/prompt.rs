use std::io::{BufRead, Write};

use scenario::{Asker, InputError, Value};

/// Instance types offered by `scen create instance`.
pub const INSTANCE_TYPES: &[&str] = &[
    "t2.nano:   vCPU=1, CPU/hour=3, Mem GiB=0.5, EBS only",
    "t2.micro:  vCPU=1, CPU/hour=6, Mem GiB=1, EBS only",
    "t2.small:  vCPU=1, CPU/hour=12, Mem GiB=2, EBS only",
    "t2.medium: vCPU=2, CPU/hour=24, Mem GiB=4, EBS only",
    "t2.large:  vCPU=2, CPU/hour=36, Mem GiB=8, EBS only",
    "t2.xlarge: vCPU=4, CPU/hour=54, Mem GiB=16, EBS only",
    "t2.2xlarge: vCPU=8, CPU/hour=81, Mem GiB=32, EBS only",
];

/// Answers hole questions from a line-oriented reader.
pub struct PromptAsker<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptAsker<R, W> {
    pub fn new(input: R, output: W) -> Self {
        PromptAsker { input, output }
    }

    fn read_answer(&mut self, question: &str) -> Result<String, InputError> {
        let io_err = |source| InputError::Io {
            question: question.to_string(),
            source,
        };
        write!(self.output, "{}? ", question).map_err(io_err)?;
        self.output.flush().map_err(io_err)?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(io_err)?;
        if read == 0 {
            return Err(InputError::NoAnswer {
                question: question.to_string(),
            });
        }
        Ok(line.trim().to_string())
    }
}

impl<R: BufRead, W: Write> Asker for PromptAsker<R, W> {
    fn ask(&mut self, question: &str) -> Result<Value, InputError> {
        let answer = self.read_answer(question)?;
        if answer.is_empty() {
            return Err(InputError::Unusable {
                question: question.to_string(),
                reason: "empty answer".into(),
            });
        }
        Ok(Value::parse_literal(&answer))
    }
}

/// Interactive builder behind `scen create instance`: asks for a count
/// and an instance type, shows the resulting scenario and asks for
/// confirmation. Returns `None` if the user declines.
pub fn build_instance_scenario<R: BufRead, W: Write>(
    asker: &mut PromptAsker<R, W>,
) -> Result<Option<String>, InputError> {
    let count_question = "Number of instances";
    let count = asker.read_answer(count_question)?;
    let count: u32 = count.parse().map_err(|_| InputError::Unusable {
        question: count_question.to_string(),
        reason: format!("'{}' is not a positive number", count),
    })?;
    if count == 0 {
        return Err(InputError::Unusable {
            question: count_question.to_string(),
            reason: "at least one instance is required".into(),
        });
    }

    let type_question = "\nType of instance";
    let io_err = |source| InputError::Io {
        question: type_question.trim().to_string(),
        source,
    };
    writeln!(asker.output).map_err(io_err)?;
    for (index, typ) in INSTANCE_TYPES.iter().enumerate() {
        writeln!(asker.output, "{}. {}", index + 1, typ).map_err(io_err)?;
    }
    let choice = asker.read_answer(type_question)?;
    let instance_type = choice
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| INSTANCE_TYPES.get(i))
        .and_then(|line| line.split(':').next())
        .ok_or_else(|| InputError::Unusable {
            question: type_question.trim().to_string(),
            reason: format!("choose a number between 1 and {}", INSTANCE_TYPES.len()),
        })?;

    let scenario = format!("create instance count={} type={}", count, instance_type);

    writeln!(asker.output, "\nDone\n\n{}\n", scenario).map_err(io_err)?;
    let confirm = asker.read_answer("About to run (y/n)")?;
    if confirm == "y" {
        Ok(Some(scenario))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn asker(input: &str) -> PromptAsker<Cursor<Vec<u8>>, Vec<u8>> {
        PromptAsker::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn answers_become_typed_values() {
        let mut a = asker("70\ntrump\n");
        assert_eq!(a.ask("Age_of_president").unwrap(), Value::Number(70.0));
        assert_eq!(a.ask("Name_of_president").unwrap(), Value::from("trump"));
        assert_eq!(
            String::from_utf8(a.output).unwrap(),
            "Age_of_president? Name_of_president? "
        );
    }

    #[test]
    fn empty_and_missing_answers_are_input_errors() {
        let mut a = asker("\n");
        assert!(matches!(a.ask("Name"), Err(InputError::Unusable { .. })));
        assert!(matches!(a.ask("Name"), Err(InputError::NoAnswer { .. })));
    }

    #[test]
    fn builds_instance_scenario() {
        let mut a = asker("3\n2\ny\n");
        let scenario = build_instance_scenario(&mut a).unwrap();
        assert_eq!(
            scenario.as_deref(),
            Some("create instance count=3 type=t2.micro")
        );
    }

    #[test]
    fn declined_instance_scenario() {
        let mut a = asker("1\n1\nn\n");
        assert_eq!(build_instance_scenario(&mut a).unwrap(), None);
    }

    #[test]
    fn out_of_range_type_is_rejected() {
        let mut a = asker("1\n0\n");
        assert!(matches!(
            build_instance_scenario(&mut a),
            Err(InputError::Unusable { .. })
        ));
    }
}
