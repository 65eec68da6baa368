use spaces_simple::prelude::*;
use std::env;

#[tokio::main]
async fn main() -> Result<(), SpacesError> {
    dotenvy::dotenv().ok();

    // The adapter can be initialized from ENV, or manually.
    // `try_from_env` expects:
    // ```
    // SPACES_ACCESS_KEY_ID=
    // SPACES_SECRET_ACCESS_KEY=
    // # optional
    // SPACES_REGION=nyc3
    // SPACES_DOMAIN=digitaloceanspaces.com
    // SPACES_DANGER_ALLOW_INSECURE=false
    // ```
    let spaces = Spaces::try_from_env()?;

    // Errors of the listing calls are already reduced to something you can
    // show to a user: CORS, authentication, or a generic "try again".
    let buckets = match spaces.list_buckets().await {
        Ok(buckets) => buckets,
        Err(err) => {
            eprintln!("Failed to connect: {}", err);
            return Ok(());
        }
    };

    println!("Your Spaces:");
    for bucket in buckets.iter() {
        println!("  {}", bucket.name);
    }

    // browse the first one, or the one given as the first argument
    let name = match env::args().nth(1) {
        Some(name) => name,
        None => match buckets.first() {
            Some(bucket) => bucket.name.clone(),
            None => return Ok(()),
        },
    };
    let prefix = env::args().nth(2).unwrap_or_default();

    let objects = spaces
        .list_objects_with_signed_urls(&name, &prefix)
        .await?;
    println!("Contents of {}:", name);
    for object in objects.iter() {
        // the URLs expire after one hour
        println!(
            "  {} ({} KB) {}",
            object.key,
            object.size.unwrap_or_default().div_ceil(1024),
            object.access_url.as_deref().unwrap_or_default()
        );
    }

    Ok(())
}
