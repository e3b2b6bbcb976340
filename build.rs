fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Capture build metadata (timestamp, rustc, git revision when the
    // sources live in a repository) for the startup log line.
    vergen::EmitBuilder::builder()
        .all_build()
        .all_git()
        .emit()?;
    Ok(())
}
