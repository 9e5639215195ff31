// Define an errors module and use a glob import as recommended by:
//
//     http://brson.github.io/2016/11/30/starting-with-error-chain
//

// Create the Error, ErrorKind, ResultExt, and Result types
error_chain!{
    // Automatic conversions between this error chain and other error types not defined by the
    // `error_chain!`. The description and cause will forward to the description and cause of the
    // original error.
    foreign_links {
        Database(::diesel::result::Error);
        DatabaseConnection(::diesel::result::ConnectionError);
        DatabaseConnectionPool(::r2d2::Error);
        Io(::std::io::Error);
        Migration(::diesel_migrations::RunMigrationsError);
        UrlParse(::url::ParseError);
    }

    links {
        User(user_errors::Error, user_errors::ErrorKind);
    }
}

// Collect error strings together so that we can build a good error message to
// send up. It's worth nothing that the original error is actually at the end of
// the iterator, but since it's the most relevant, we reverse the list.
//
// The chain isn't a double-ended iterator (meaning we can't use `rev`), so we
// have to collect it to a Vec first before reversing it.
pub fn error_strings(error: &Error) -> Vec<String> {
    error
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .iter()
        .cloned()
        .rev()
        .collect()
}

/// Gets the kind of a user error so that a caller can map it to a response
/// status (a lookup miss versus a validation failure, for example).
///
/// Returns `None` for anything that isn't a user error.
pub fn user_error_kind(error: &Error) -> Option<&user_errors::ErrorKind> {
    match *error.kind() {
        ErrorKind::User(ref error_kind) => Some(error_kind),
        _ => None,
    }
}

/// Gets an error message suitable for display by the user.
///
/// This function only returns `Some` if the given `Result` is an error and if
/// that error is a user error. Otherwise, it returns `None`.
pub fn user_error_message<T>(res: &Result<T>) -> Option<String> {
    if let Err(ref e) = *res {
        return user_error_kind(e).map(|error_kind| format!("{}", error_kind));
    }

    None
}

/// Gets a message that's always safe to send back to a client.
///
/// User errors are rendered as is. Everything else that can escape the sync
/// engine originates in the record store, so it's reported generically to
/// avoid leaking internals.
pub fn public_message(error: &Error) -> String {
    match user_error_kind(error) {
        Some(error_kind) => format!("{}", error_kind),
        None => "Database error".to_owned(),
    }
}

/// Whether an error is internal (as opposed to one caused by bad input or a
/// lookup miss).
pub fn is_internal(error: &Error) -> bool {
    user_error_kind(error).is_none()
}

//
// User error chain
//

/// An error chain for user errors that should be transformed into something
/// user-facing before being sent back with a request.
pub mod user_errors {
    use errors;

    error_chain!{
        errors {
            NoData(message: String) {
                description("No data"),
                display("No data: {}", message),
            }

            UnknownDevice(name: String) {
                description("Unknown device"),
                display("Unknown device: \"{}\"", name),
            }

            UnknownEpisode(url: String) {
                description("Unknown episode"),
                display("Unknown episode: \"{}\"", url),
            }

            UnknownPodcast(url: String) {
                description("Unknown podcast"),
                display("Unknown podcast: \"{}\"", url),
            }

            UnknownUser(username: String) {
                description("Unknown user"),
                display("Unknown user: \"{}\"", username),
            }

            Validation(message: String) {
                description("Validation error"),
                display("Validation failed: {}", message),
            }
        }
    }

    //
    // Public functions
    //

    #[inline]
    pub fn no_data<S: Into<String>>(message: S) -> errors::Error {
        to_error(ErrorKind::NoData(message.into()))
    }

    #[inline]
    pub fn unknown_device<S: Into<String>>(name: S) -> errors::Error {
        to_error(ErrorKind::UnknownDevice(name.into()))
    }

    #[inline]
    pub fn unknown_episode<S: Into<String>>(url: S) -> errors::Error {
        to_error(ErrorKind::UnknownEpisode(url.into()))
    }

    #[inline]
    pub fn unknown_podcast<S: Into<String>>(url: S) -> errors::Error {
        to_error(ErrorKind::UnknownPodcast(url.into()))
    }

    #[inline]
    pub fn unknown_user<S: Into<String>>(username: S) -> errors::Error {
        to_error(ErrorKind::UnknownUser(username.into()))
    }

    #[inline]
    pub fn validation<S: Into<String>>(message: S) -> errors::Error {
        to_error(ErrorKind::Validation(message.into()))
    }

    //
    // Private functions
    //

    #[inline]
    fn to_error(e: ErrorKind) -> errors::Error {
        let user_e: Error = e.into();
        user_e.into()
    }
}
