#[rocket::launch]
fn launch() -> _ {
    let rocket = cycles_api::rocket();
    log::info!("starting cycle stats api");
    rocket
}
