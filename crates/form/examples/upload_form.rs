use http_body_util::BodyExt;
use micro_form::form::Form;
use std::error::Error;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

// cargo run --example upload_form -- ./some-file [more files...]
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut form = Form::new();
    form.add_field("product[version]", "2.1.0")?;

    for path in std::env::args().skip(1) {
        form.add_file("product[file]", &path).await?;
    }

    let submission = form.finalize();
    info!(
        content_length = submission.content_length(),
        content_type = submission.content_type(),
        "submission ready"
    );

    // an HTTP client would send the body with the advertised length; here we
    // just drain it and show the length was exact
    let content_length = submission.content_length();
    let payload = submission.into_body().collect().await?.to_bytes();
    assert_eq!(payload.len() as u64, content_length);
    info!(drained = payload.len(), "payload drained, advertised length was exact");

    Ok(())
}
