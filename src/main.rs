//! Conversion CLI: `bdatrs input.(dta|por|sav|sas7bdat) [catalog.sas7bcat] output.(csv|sas7bdat)`.

fn main() {
    env_logger::init();
    let code = bdatrs::driver::run(std::env::args().collect());
    std::process::exit(code);
}
