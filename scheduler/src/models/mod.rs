macro_rules! import_models {
    ($x:ident) => {
        mod $x;
        pub use self::$x::*;
    };
}

import_models!(source_package);
import_models!(build_result);
import_models!(schedule);
import_models!(note);
import_models!(removed_package);
import_models!(manual_request);
