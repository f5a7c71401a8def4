fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = bmmc::cli::Args::parse();
    let level = bmmc::logging::level_for(args.quiet, args.verbose);
    if let Err(e) = bmmc::logging::init(level) {
        eprintln!("Warning: {:#}", e);
    }
    if let Err(e) = bmmc::cli::run(&args) {
        tracing::debug!(exit_code = e.exit_code(), "run failed");
        eprintln!("{}", e);
        if args.verbose {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}
