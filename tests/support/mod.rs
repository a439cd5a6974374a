use contactlink::{ContactStore, IdentifyRequest, IdentifyResponse, Reconciler};

#[allow(dead_code)]
pub fn request(email: Option<&str>, phone: Option<&str>) -> IdentifyRequest {
    IdentifyRequest::new(email, phone)
}

/// Run one identify call, panicking on failure; keeps test bodies focused
/// on the scenario rather than plumbing.
#[allow(dead_code)]
pub fn identify<S: ContactStore>(
    reconciler: &mut Reconciler<S>,
    email: Option<&str>,
    phone: Option<&str>,
) -> IdentifyResponse {
    reconciler
        .identify(&request(email, phone))
        .expect("identify call failed")
}

/// Assert the de-duplication invariant every response must satisfy: no
/// repeated value in either list.
#[allow(dead_code)]
pub fn assert_no_duplicates(response: &IdentifyResponse) {
    let summary = &response.contact;
    for (index, email) in summary.emails.iter().enumerate() {
        assert!(
            !summary.emails[index + 1..].contains(email),
            "duplicate email {email:?} in {:?}",
            summary.emails
        );
    }
    for (index, phone) in summary.phone_numbers.iter().enumerate() {
        assert!(
            !summary.phone_numbers[index + 1..].contains(phone),
            "duplicate phone {phone:?} in {:?}",
            summary.phone_numbers
        );
    }
}
