pub mod dome;
pub mod theme;
pub mod show;
pub mod session;
pub mod ticket;
pub mod reservation;
pub mod user;

pub use dome::{Dome, NewDome};
pub use theme::{NewTheme, Theme};
pub use show::{NewShow, Show};
pub use session::{NewSession, Session, SessionResponse};
pub use ticket::{NewTicket, Ticket};
pub use reservation::Reservation;
pub use user::{NewUser, User};
