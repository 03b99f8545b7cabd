use std::{
    collections::BTreeSet,
    fs::File,
    io::{self, BufRead},
    path::{Path, PathBuf},
    process::{exit, Command},
};

use clap::Parser;
use console::{style, Term};
use glob::glob;
use regex::Regex;

#[derive(Parser, Debug)]
#[command(about = "Runs the .lox samples through glox-cli and checks their annotations")]
struct Args {
    /// Only run samples whose path, relative to the samples directory, starts with this.
    filter: Option<String>,

    /// Interpreter binary to run each sample with.
    #[arg(long, default_value = "./target/debug/glox-cli")]
    binary: PathBuf,

    /// Directory holding the samples.
    #[arg(long, default_value = "samples")]
    samples: PathBuf,
}

struct ExpectedOutput {
    line: usize,
    output: String,
}

impl ExpectedOutput {
    pub fn new(line: usize, output: String) -> Self {
        ExpectedOutput { line, output }
    }
}

struct Patterns {
    expected_output: Regex,
    expected_error: Regex,
    error_line: Regex,
    non_test: Regex,
}

impl Patterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Patterns {
            expected_output: Regex::new(r"// expect: ?(.*)")?,
            expected_error: Regex::new(r"// (Error.*)")?,
            error_line: Regex::new(r"// \[line (\d+)\] (Error.*)")?,
            non_test: Regex::new(r"// nontest")?,
        })
    }
}

struct Test {
    path: PathBuf,
    expected_output: Vec<ExpectedOutput>,
    expected_errors: BTreeSet<String>,
    expected_exit_code: i32,
    expectations: u32,
}

impl Test {
    fn new(path: PathBuf) -> Self {
        Test {
            path,
            expected_output: Vec::new(),
            expected_errors: BTreeSet::new(),
            expected_exit_code: 0,
            expectations: 0,
        }
    }

    fn parse(&mut self, patterns: &Patterns) -> io::Result<bool> {
        for (line_num, line) in read_lines(&self.path)?.enumerate() {
            let line = line?;

            // Not a test file at all, so ignore it.
            if patterns.non_test.is_match(&line) {
                return Ok(false);
            }

            if let Some(captures) = patterns.expected_output.captures(&line) {
                self.expected_output
                    .push(ExpectedOutput::new(line_num + 1, captures[1].to_string()));
                self.expectations += 1;
                continue;
            }

            if let Some(captures) = patterns.error_line.captures(&line) {
                self.expected_errors
                    .insert(format!("[line {}] {}", &captures[1], &captures[2]));
                self.expected_exit_code = 65;
                self.expectations += 1;
                continue;
            }

            if let Some(captures) = patterns.expected_error.captures(&line) {
                self.expected_errors
                    .insert(format!("[line {}] {}", line_num + 1, &captures[1]));
                self.expected_exit_code = 65;
                self.expectations += 1;
                continue;
            }
        }

        Ok(true)
    }

    fn run(&self, binary: &Path) -> io::Result<Vec<String>> {
        let mut failures = Vec::new();

        let result = Command::new(binary).arg(&self.path).output()?;

        // Validate that every reported error was expected and vice versa
        let stderr = String::from_utf8_lossy(&result.stderr);
        let mut found_errors = BTreeSet::new();
        for line in stderr.lines().filter(|line| !line.is_empty()) {
            if self.expected_errors.contains(line) {
                found_errors.insert(line.to_string());
            } else {
                failures.push(format!("Unexpected output on stderr: {}", line));
            }
        }
        for error in self.expected_errors.difference(&found_errors) {
            failures.push(format!("Missing expected error: {}", error));
        }

        // Validate exit code
        let exit_code = result.status.code();
        if exit_code != Some(self.expected_exit_code) {
            failures.push(format!(
                "Expected return code {} and got {:?}.",
                self.expected_exit_code, exit_code
            ));
        }

        // Validate output
        let stdout = String::from_utf8_lossy(&result.stdout);
        let output_lines: Vec<&str> = stdout.lines().collect();
        for (index, line) in output_lines.iter().enumerate() {
            match self.expected_output.get(index) {
                Some(expected) if expected.output != *line => failures.push(format!(
                    "Expected output '{}' on line {} and got '{}'.",
                    expected.output, expected.line, line
                )),
                Some(_) => {}
                None => failures.push(format!("Got output '{}' when none was expected.", line)),
            }
        }
        for expected in self.expected_output.iter().skip(output_lines.len()) {
            failures.push(format!(
                "Missing expected output '{}' on line {}.",
                expected.output, expected.line
            ));
        }

        Ok(failures)
    }
}

struct Tester {
    args: Args,
    patterns: Patterns,
    passed: u32,
    failed: u32,
    skipped: u32,
    expectations: u32,
}

impl Tester {
    fn new(args: Args, patterns: Patterns) -> Self {
        Tester {
            args,
            patterns,
            passed: 0,
            failed: 0,
            skipped: 0,
            expectations: 0,
        }
    }

    fn run_suite(&mut self) -> io::Result<bool> {
        let term = Term::stdout();

        let pattern = self.args.samples.join("**").join("*.lox");
        let paths = glob(&pattern.to_string_lossy())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        for path in paths {
            let path = path.map_err(|err| err.into_error())?;
            self.run_test(&term, path)?;
        }

        if self.failed == 0 {
            println!(
                "All {} tests passed ({} expectations).",
                style(self.passed).green(),
                self.expectations
            );
        } else {
            println!(
                "{} tests passed. {} tests failed.",
                style(self.passed).green(),
                style(self.failed).red()
            );
        }

        Ok(self.failed == 0)
    }

    fn run_test(&mut self, term: &Term, path: PathBuf) -> io::Result<()> {
        // Check if we are just running a subset of the tests.
        if let Some(filter_path) = &self.args.filter {
            let test_path = pathdiff::diff_paths(&path, &self.args.samples).unwrap_or_default();
            if !test_path.to_string_lossy().starts_with(filter_path.as_str()) {
                return Ok(());
            }
        }

        term.write_line(&format!(
            "Passed: {} Failed: {} Skipped: {} ({})",
            style(self.passed).green(),
            style(self.failed).red(),
            style(self.skipped).yellow(),
            style(path.display())
        ))?;

        let mut test = Test::new(path);
        let is_test = test.parse(&self.patterns)?;
        term.clear_last_lines(1)?;
        if !is_test {
            self.skipped += 1;
            return Ok(());
        }
        self.expectations += test.expectations;

        let failures = test.run(&self.args.binary)?;
        if failures.is_empty() {
            self.passed += 1;
        } else {
            self.failed += 1;
            println!("{}: {}", style("FAIL").red(), test.path.display());
            println!();
            for failure in &failures {
                println!("\t{}", style(failure).blue());
            }
            println!();
        }

        Ok(())
    }
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    let patterns =
        Patterns::new().map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

    let mut tester = Tester::new(args, patterns);
    if !tester.run_suite()? {
        exit(1);
    }

    Ok(())
}

// Returns an Iterator to the Reader of the lines of the file.
fn read_lines<P>(filename: P) -> io::Result<io::Lines<io::BufReader<File>>>
where
    P: AsRef<Path>,
{
    let file = File::open(filename)?;
    Ok(io::BufReader::new(file).lines())
}
