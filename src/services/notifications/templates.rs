//! HTML email templates for booking lifecycle transitions.

use crate::entities::{booking, car, user};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEmail {
    DepositConfirmed,
    AdminDepositNotice,
    Approved,
    FinalConfirmed,
    AdminFinalNotice,
}

pub struct BookingEmailContext<'a> {
    pub booking: &'a booking::Model,
    pub car: &'a car::Model,
    pub customer: &'a user::Model,
}

pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

fn dollars(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

fn summary_table(ctx: &BookingEmailContext) -> String {
    format!(
        "<table>\
         <tr><td>Booking</td><td>{key}</td></tr>\
         <tr><td>Car</td><td>{car}</td></tr>\
         <tr><td>Dates</td><td>{start} to {end}</td></tr>\
         <tr><td>Pickup</td><td>{location}</td></tr>\
         <tr><td>Total</td><td>{total}</td></tr>\
         <tr><td>Deposit</td><td>{deposit}</td></tr>\
         </table>",
        key = ctx.booking.booking_key,
        car = ctx.car.display_name(),
        start = ctx.booking.start_date,
        end = ctx.booking.end_date,
        location = ctx.booking.pickup_location,
        total = dollars(ctx.booking.total_price_cents),
        deposit = dollars(ctx.booking.deposit_cents),
    )
}

pub fn render(kind: BookingEmail, ctx: &BookingEmailContext) -> RenderedEmail {
    let table = summary_table(ctx);
    let name = &ctx.customer.name;
    let key = &ctx.booking.booking_key;

    match kind {
        BookingEmail::DepositConfirmed => RenderedEmail {
            subject: format!("Deposit received for booking {}", key),
            html: format!(
                "<h2>Thanks, {name}!</h2>\
                 <p>We received your deposit. Your booking is now awaiting review \
                 and we will be in touch shortly.</p>{table}"
            ),
        },
        BookingEmail::AdminDepositNotice => RenderedEmail {
            subject: format!("Deposit paid: booking {} awaiting approval", key),
            html: format!(
                "<h2>New booking awaiting approval</h2>\
                 <p>{name} ({email}) paid the deposit for the booking below.</p>{table}",
                email = ctx.customer.email,
            ),
        },
        BookingEmail::Approved => RenderedEmail {
            subject: format!("Your booking {} is approved", key),
            html: format!(
                "<h2>Good news, {name}!</h2>\
                 <p>Your booking has been approved. Pay the remaining balance of \
                 {balance} to confirm it.</p>{table}",
                balance = dollars(ctx.booking.total_price_cents - ctx.booking.deposit_cents),
            ),
        },
        BookingEmail::FinalConfirmed => RenderedEmail {
            subject: format!("Booking {} confirmed", key),
            html: format!(
                "<h2>You're all set, {name}!</h2>\
                 <p>Your final payment went through and the booking is confirmed. \
                 See you on {start}.</p>{table}",
                start = ctx.booking.start_date,
            ),
        },
        BookingEmail::AdminFinalNotice => RenderedEmail {
            subject: format!("Final payment received: booking {}", key),
            html: format!(
                "<h2>Booking confirmed</h2>\
                 <p>{name} ({email}) paid the remaining balance.</p>{table}",
                email = ctx.customer.email,
            ),
        },
    }
}

pub fn render_contact(
    name: &str,
    email: &str,
    phone: &str,
    subject: &str,
    message: &str,
) -> RenderedEmail {
    RenderedEmail {
        subject: format!("Contact form: {}", subject),
        html: format!(
            "<h2>New contact form submission</h2>\
             <p><strong>{name}</strong> &lt;{email}&gt; {phone}</p>\
             <p>{message}</p>"
        ),
    }
}

/// SMS prompt sent to the admin when a deposit lands; the suffix is what the
/// YES/NO reply commands match on.
pub fn admin_sms_prompt(ctx: &BookingEmailContext) -> String {
    let key = &ctx.booking.booking_key;
    let suffix = &key[key.len() - crate::utils::booking_key::SUFFIX_LEN..];
    format!(
        "New booking {key}: {car}, {start} to {end}. Reply YES {suffix} to approve or NO {suffix} to reject.",
        car = ctx.car.display_name(),
        start = ctx.booking.start_date,
        end = ctx.booking.end_date,
    )
}
